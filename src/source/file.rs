//! JSON-lines file source: one item per non-empty line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, trace};

use super::{DataSource, PageRequest, Record, ResponsePayload};

/// Pages over a JSON-lines file.
///
/// The file is re-read on every fetch so that edits on disk show up after a
/// reset without reopening the source.
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    /// Open a source backed by `path`. Fails if the file cannot be read.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::metadata(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl DataSource<Record> for JsonLinesSource {
    fn fetch_page(&mut self, request: &PageRequest) -> Result<ResponsePayload<Record>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let payload = page_from_lines(&text, request)
            .with_context(|| format!("in {}", self.path.display()))?;
        debug!(
            "file source: page {} -> {} item(s) of {} (last_page={})",
            request.page, payload.count, payload.total, payload.last_page
        );
        Ok(payload)
    }
}

/// Slice one page out of JSON-lines text. Only the lines on the page are parsed.
fn page_from_lines(text: &str, request: &PageRequest) -> Result<ResponsePayload<Record>> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();
    let total = lines.len();
    let start = request.offset().min(total);
    let end = (start + request.modifiers.per_page).min(total);

    let items = lines[start..end]
        .iter()
        .map(|&(line_no, line)| {
            trace!("file source: parsing line {}", line_no + 1);
            serde_json::from_str::<Record>(line)
                .with_context(|| format!("invalid JSON on line {}", line_no + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResponsePayload::for_request(request, items, total, end >= total))
}
