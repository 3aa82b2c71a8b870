use std::io;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use infiniscroll::config::{self, CliOverrides};
use infiniscroll::engine::IndexingMode;
use infiniscroll::source::SourceSpec;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("INFINISCROLL_BUILD_GIT_HASH"),
    " ",
    env!("INFINISCROLL_BUILD_PROFILE"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "infiniscroll",
    version = VERSION,
    about = "Infinite-scroll list viewer over paged data sources"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Source: JSON-lines file, http(s) URL, or `synthetic[:N]`
    #[arg(global = true)]
    source: Option<String>,

    /// Items per page
    #[arg(long, global = true)]
    per_page: Option<usize>,

    /// Prefetch trigger addressing
    #[arg(long, global = true, value_enum)]
    indexing: Option<Indexing>,

    /// Always redraw the whole list instead of applying index deltas
    #[arg(long, global = true)]
    force_reload: bool,

    /// Artificial latency for synthetic sources, in milliseconds
    #[arg(long, global = true)]
    latency_ms: Option<u64>,

    /// Do not reset the list when a file source changes on disk
    #[arg(long, global = true)]
    no_watch: bool,

    /// Log output file path (enables logging when specified)
    #[arg(long, global = true)]
    log: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Page through a source without a terminal and print each delta
    Dump {
        /// Stop after this many accepted pages
        #[arg(long)]
        pages: Option<usize>,

        /// Print every item as it is merged
        #[arg(long)]
        items: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Indexing {
    Row,
    Section,
}

impl From<Indexing> for IndexingMode {
    fn from(v: Indexing) -> Self {
        match v {
            Indexing::Row => IndexingMode::Row,
            Indexing::Section => IndexingMode::Section,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = std::fs::File::create(log_path).expect("failed to open log file");
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if cli.command.is_some() {
        env_logger::init();
    }
    // viewer mode + no --log → logger not initialized (keeps the TUI clean)

    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.merge_cli(&CliOverrides {
        per_page: cli.per_page,
        indexing: cli.indexing.map(IndexingMode::from),
        force_reload: cli.force_reload,
        latency_ms: cli.latency_ms,
    });
    let config = cfg.resolve();

    let result = SourceSpec::parse(cli.source.as_deref().unwrap_or("synthetic")).and_then(
        |spec| match cli.command {
            Some(Command::Dump { pages, items }) => cmd_dump(&spec, &config, pages, items),
            None => infiniscroll::viewer::run(spec, config, !cli.no_watch),
        },
    );

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_dump(
    spec: &SourceSpec,
    config: &config::Config,
    pages: Option<usize>,
    items: bool,
) -> Result<()> {
    let start = Instant::now();
    let total = infiniscroll::dump::run(spec, config, pages, items, io::stdout().lock())?;
    info!(
        "cmd_dump: completed in {:.1}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    eprintln!("{}: {total} item(s)", spec.display_name());
    Ok(())
}
