use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use crate::engine::{
    DEFAULT_BUFFER_DISTANCE, DEFAULT_LOADING_CELL_HEIGHT, DEFAULT_PER_PAGE,
    DEFAULT_PLACEHOLDER_CELLS, IndexingMode, Modifiers,
};

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfigFile,
    #[serde(default)]
    pub viewer: ViewerConfigFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct EngineConfigFile {
    pub force_reload: Option<bool>,
    pub indexing: Option<IndexingMode>,
    pub buffer_distance: Option<usize>,
    pub loading_cell_height: Option<f64>,
    pub placeholder_cells: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfigFile {
    pub scroll_step: Option<u32>,
    pub frame_budget_ms: Option<u64>,
    pub watch_interval_ms: Option<u64>,
    pub synthetic_latency_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

pub struct Config {
    pub engine: Modifiers,
    pub viewer: ViewerConfig,
}

pub struct ViewerConfig {
    pub scroll_step: u32,
    pub frame_budget: Duration,
    pub watch_interval: Duration,
    pub synthetic_latency: Duration,
}

/// CLI values that take precedence over the config file.
#[derive(Default, Clone)]
pub struct CliOverrides {
    pub per_page: Option<usize>,
    pub indexing: Option<IndexingMode>,
    pub force_reload: bool,
    pub latency_ms: Option<u64>,
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, cli: &CliOverrides) {
        if let Some(v) = cli.per_page {
            debug!("config: CLI override per_page={v}");
            self.engine.per_page = Some(v);
        }
        if let Some(v) = cli.indexing {
            debug!("config: CLI override indexing={v:?}");
            self.engine.indexing = Some(v);
        }
        if cli.force_reload {
            debug!("config: CLI override force_reload=true");
            self.engine.force_reload = Some(true);
        }
        if let Some(v) = cli.latency_ms {
            debug!("config: CLI override synthetic_latency_ms={v}");
            self.viewer.synthetic_latency_ms = Some(v);
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let e = self.engine;
        let config = Config {
            engine: Modifiers {
                force_reload: e.force_reload.unwrap_or(false),
                indexing: e.indexing.unwrap_or_default(),
                buffer_distance: e.buffer_distance.unwrap_or(DEFAULT_BUFFER_DISTANCE),
                loading_cell_height: e
                    .loading_cell_height
                    .unwrap_or(DEFAULT_LOADING_CELL_HEIGHT),
                placeholder_cells: e.placeholder_cells.unwrap_or(DEFAULT_PLACEHOLDER_CELLS),
                // A zero page size would never advance.
                per_page: e.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1),
            },
            viewer: ViewerConfig {
                scroll_step: self.viewer.scroll_step.unwrap_or(1),
                frame_budget: Duration::from_millis(self.viewer.frame_budget_ms.unwrap_or(32)),
                watch_interval: Duration::from_millis(
                    self.viewer.watch_interval_ms.unwrap_or(200),
                ),
                synthetic_latency: Duration::from_millis(
                    self.viewer.synthetic_latency_ms.unwrap_or(300),
                ),
            },
        };
        info!(
            "config: resolved per_page={}, indexing={:?}, buffer_distance={}, \
             placeholder_cells={}, force_reload={}, loading_cell_height={}, \
             scroll_step={}, frame_budget={}ms, watch_interval={}ms, latency={}ms",
            config.engine.per_page,
            config.engine.indexing,
            config.engine.buffer_distance,
            config.engine.placeholder_cells,
            config.engine.force_reload,
            config.engine.loading_cell_height,
            config.viewer.scroll_step,
            config.viewer.frame_budget.as_millis(),
            config.viewer.watch_interval.as_millis(),
            config.viewer.synthetic_latency.as_millis(),
        );
        config
    }
}

/// Resolve the XDG config path.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("infiniscroll").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}
