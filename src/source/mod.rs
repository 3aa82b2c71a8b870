//! Data sources and the fetch worker.
//!
//! A [`DataSource`] answers one page at a time and may block (disk, network,
//! artificial latency). It never runs on the owner's thread: [`spawn_worker`]
//! moves it onto a dedicated thread fed by an `mpsc` request channel, and the
//! owner drains results with [`FetchWorker::try_recv`] at each poll cycle.
//! That drain is the only point where a fetch "completes" from the engine's
//! point of view, so the engine itself stays single-threaded.

pub mod file;
pub mod http;
pub mod synthetic;

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, error};

use crate::engine::Modifiers;
use crate::session::SessionToken;

/// Item type produced by the built-in sources.
pub type Record = serde_json::Value;

/// One request sent to the worker.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: usize,
    pub modifiers: Modifiers,
    /// Token the source must echo back in its payload.
    pub session: SessionToken,
}

impl PageRequest {
    /// Index of the first item on this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.modifiers.per_page
    }
}

/// One page as reported by a data source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePayload<T> {
    pub items: Vec<T>,
    pub count: usize,
    pub per_page: usize,
    /// Total items available, as reported by the source.
    pub total: usize,
    pub last_page: bool,
    pub session: SessionToken,
}

impl<T> ResponsePayload<T> {
    /// Build a payload for `request`, echoing its session token.
    pub fn for_request(
        request: &PageRequest,
        items: Vec<T>,
        total: usize,
        last_page: bool,
    ) -> Self {
        Self {
            count: items.len(),
            items,
            per_page: request.modifiers.per_page,
            total,
            last_page,
            session: request.session.clone(),
        }
    }
}

/// Outcome of one request, tagged with the page and session it was issued for.
#[derive(Debug)]
pub struct FetchResult<T> {
    pub page: usize,
    pub session: SessionToken,
    pub outcome: Result<ResponsePayload<T>>,
}

/// Supplies pages to the engine.
pub trait DataSource<T> {
    /// Fetch `request.page`. Blocking is fine: this runs on the worker thread.
    ///
    /// Implementations must echo `request.session` in the payload and report
    /// `count`, `total`, `per_page` and `last_page` truthfully.
    fn fetch_page(&mut self, request: &PageRequest) -> Result<ResponsePayload<T>>;
}

impl<T, D: DataSource<T> + ?Sized> DataSource<T> for Box<D> {
    fn fetch_page(&mut self, request: &PageRequest) -> Result<ResponsePayload<T>> {
        (**self).fetch_page(request)
    }
}

/// Receiving half of a running fetch worker.
pub struct FetchWorker<T> {
    rx: mpsc::Receiver<FetchResult<T>>,
    _handle: JoinHandle<()>,
}

impl<T> FetchWorker<T> {
    /// Take one finished fetch, if any. Non-blocking.
    pub fn try_recv(&self) -> Option<FetchResult<T>> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for one finished fetch.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FetchResult<T>> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Move `source` onto a worker thread.
///
/// Requests are served FIFO. The worker exits once every clone of the
/// returned sender is dropped.
pub fn spawn_worker<T, D>(mut source: D) -> (mpsc::Sender<PageRequest>, FetchWorker<T>)
where
    T: Send + 'static,
    D: DataSource<T> + Send + 'static,
{
    let (req_tx, req_rx) = mpsc::channel::<PageRequest>();
    let (res_tx, res_rx) = mpsc::channel::<FetchResult<T>>();

    let handle = thread::spawn(move || {
        debug!("fetch worker: started");
        while let Ok(request) = req_rx.recv() {
            debug!("fetch worker: page {} (session {})", request.page, request.session);
            let outcome = source.fetch_page(&request);
            if let Err(e) = &outcome {
                error!("fetch worker: page {} failed: {e:#}", request.page);
            }
            let result = FetchResult {
                page: request.page,
                session: request.session,
                outcome,
            };
            if res_tx.send(result).is_err() {
                break;
            }
        }
        debug!("fetch worker: channel closed, exiting");
    });

    (
        req_tx,
        FetchWorker {
            rx: res_rx,
            _handle: handle,
        },
    )
}

// ---------------------------------------------------------------------------
// Source selection from the command line
// ---------------------------------------------------------------------------

/// Which built-in source a CLI argument names.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// JSON-lines file, one item per line.
    File(PathBuf),
    /// Paged JSON endpoint.
    Http(String),
    /// Generated rows.
    Synthetic { total: usize },
}

const DEFAULT_SYNTHETIC_TOTAL: usize = 200;

impl SourceSpec {
    /// Parse a source argument: `http(s)://...`, `synthetic[:N]`, or a file path.
    pub fn parse(arg: &str) -> Result<Self> {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            return Ok(Self::Http(arg.to_string()));
        }
        if let Some(rest) = arg.strip_prefix("synthetic") {
            let total = match rest.strip_prefix(':') {
                Some(n) => n
                    .parse::<usize>()
                    .with_context(|| format!("invalid synthetic item count '{n}'"))?,
                None if rest.is_empty() => DEFAULT_SYNTHETIC_TOTAL,
                None => return Ok(Self::File(PathBuf::from(arg))),
            };
            return Ok(Self::Synthetic { total });
        }
        if arg.is_empty() {
            bail!("empty source argument");
        }
        Ok(Self::File(PathBuf::from(arg)))
    }

    /// File to watch for changes, if the source is file-backed.
    pub fn watch_path(&self) -> Option<&PathBuf> {
        match self {
            Self::File(path) => Some(path),
            _ => None,
        }
    }

    /// Display name for the status bar.
    pub fn display_name(&self) -> String {
        match self {
            Self::File(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string(),
            Self::Http(url) => url.clone(),
            Self::Synthetic { total } => format!("synthetic ({total} items)"),
        }
    }

    /// Construct the source. `latency` only applies to synthetic sources.
    pub fn open(&self, latency: Duration) -> Result<Box<dyn DataSource<Record> + Send>> {
        Ok(match self {
            Self::File(path) => Box::new(file::JsonLinesSource::open(path)?),
            Self::Http(url) => Box::new(http::HttpSource::new(url)),
            Self::Synthetic { total } => Box::new(synthetic::SyntheticSource::new(*total, latency)),
        })
    }
}

/// Short human-readable label for a record.
///
/// Strings are shown as-is; objects use their `title` or `name` field when
/// present; anything else falls back to compact JSON.
pub fn record_label(record: &Record) -> String {
    match record {
        Record::String(s) => s.clone(),
        Record::Object(map) => ["title", "name"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| record.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(page: usize, per_page: usize) -> PageRequest {
        PageRequest {
            page,
            modifiers: Modifiers {
                per_page,
                ..Modifiers::default()
            },
            session: SessionToken::from("test"),
        }
    }

    #[test]
    fn parse_http() {
        assert_eq!(
            SourceSpec::parse("https://api.invalid/items").unwrap(),
            SourceSpec::Http("https://api.invalid/items".into())
        );
    }

    #[test]
    fn parse_synthetic_default_and_count() {
        assert_eq!(
            SourceSpec::parse("synthetic").unwrap(),
            SourceSpec::Synthetic { total: DEFAULT_SYNTHETIC_TOTAL }
        );
        assert_eq!(
            SourceSpec::parse("synthetic:35").unwrap(),
            SourceSpec::Synthetic { total: 35 }
        );
        assert!(SourceSpec::parse("synthetic:many").is_err());
    }

    #[test]
    fn parse_file_paths() {
        assert_eq!(
            SourceSpec::parse("data/items.jsonl").unwrap(),
            SourceSpec::File(PathBuf::from("data/items.jsonl"))
        );
        // A file that merely starts with "synthetic" is still a file.
        assert_eq!(
            SourceSpec::parse("synthetic.jsonl").unwrap(),
            SourceSpec::File(PathBuf::from("synthetic.jsonl"))
        );
        assert!(SourceSpec::parse("").is_err());
    }

    #[test]
    fn only_files_are_watched() {
        assert!(SourceSpec::parse("a.jsonl").unwrap().watch_path().is_some());
        assert!(SourceSpec::parse("synthetic").unwrap().watch_path().is_none());
    }

    #[test]
    fn request_offset() {
        assert_eq!(request(1, 10).offset(), 0);
        assert_eq!(request(3, 10).offset(), 20);
    }

    #[test]
    fn payload_echoes_request() {
        let req = request(2, 5);
        let p = ResponsePayload::for_request(&req, vec![1, 2, 3], 8, true);
        assert_eq!(p.count, 3);
        assert_eq!(p.per_page, 5);
        assert_eq!(p.session, req.session);
    }

    #[test]
    fn labels() {
        assert_eq!(record_label(&json!("plain")), "plain");
        assert_eq!(record_label(&json!({"title": "T", "id": 1})), "T");
        assert_eq!(record_label(&json!({"name": "N"})), "N");
        assert_eq!(record_label(&json!({"id": 1})), r#"{"id":1}"#);
        assert_eq!(record_label(&json!(42)), "42");
    }

    struct Echo;

    impl DataSource<usize> for Echo {
        fn fetch_page(&mut self, request: &PageRequest) -> Result<ResponsePayload<usize>> {
            if request.page == 99 {
                bail!("no such page");
            }
            Ok(ResponsePayload::for_request(request, vec![request.page], 100, false))
        }
    }

    #[test]
    fn worker_serves_requests_in_order() {
        let (tx, worker) = spawn_worker(Echo);
        tx.send(request(1, 1)).unwrap();
        tx.send(request(99, 1)).unwrap();
        tx.send(request(2, 1)).unwrap();

        let timeout = Duration::from_secs(5);
        let first = worker.recv_timeout(timeout).expect("first result");
        assert_eq!(first.page, 1);
        assert_eq!(first.outcome.unwrap().items, vec![1]);

        let failed = worker.recv_timeout(timeout).expect("failure result");
        assert_eq!(failed.page, 99);
        assert!(failed.outcome.is_err());

        let third = worker.recv_timeout(timeout).expect("third result");
        assert_eq!(third.page, 2);
        assert!(worker.try_recv().is_none());
    }
}
