//! Headless paging: scroll a source to its end (or a page limit) and print
//! what the engine reports for each accepted page.

use std::io::Write;
use std::time::Duration;

use anyhow::{Result, bail};
use log::{debug, info};

use crate::config::Config;
use crate::delta::IndexDelta;
use crate::engine::Engine;
use crate::source::{Record, SourceSpec, record_label, spawn_worker};
use crate::surface::ListSurface;

/// How long to wait for a single page before giving up.
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Writes one line per notification.
struct DumpSurface<W: Write> {
    out: W,
    print_items: bool,
    /// Items already printed (dataset prefix).
    printed: usize,
    failure: Option<String>,
    io_error: Option<std::io::Error>,
}

impl<W: Write> DumpSurface<W> {
    fn line(&mut self, text: &str) {
        if self.io_error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{text}") {
            self.io_error = Some(e);
        }
    }
}

impl<W: Write> ListSurface<Record> for DumpSurface<W> {
    type Cell = ();

    fn on_delta_computed(&mut self, delta: Option<&IndexDelta>) {
        let text = match delta {
            None => "delta: reload all".to_string(),
            Some(d) => format!("delta: reload {:?} insert {:?}", d.reload, d.insert),
        };
        self.line(&text);
    }

    fn on_dataset_changed(&mut self, dataset: &[Record]) {
        if dataset.len() < self.printed {
            self.printed = 0;
        }
        if self.print_items {
            for (i, record) in dataset.iter().enumerate().skip(self.printed) {
                let text = format!("{:>6}  {}", i + 1, record_label(record));
                self.line(&text);
            }
        }
        self.printed = dataset.len();
        let text = format!("dataset: {} item(s)", dataset.len());
        self.line(&text);
    }

    fn cell(&mut self, _position: usize, _item: Option<&Record>, _placeholder: bool) {}

    fn loading_cell(&mut self, _position: usize) {}

    fn on_fetch_failed(&mut self, page: usize, error: &anyhow::Error) {
        self.failure = Some(format!("page {page}: {error:#}"));
    }
}

/// Page through `spec`, writing a report to `out`.
///
/// `max_pages` limits the number of accepted pages (`None` = until the source
/// reports its last page). A source failure aborts with an error, and so does
/// a dataset whose rows never reach the fetch trigger before the last page.
pub fn run<W: Write>(
    spec: &SourceSpec,
    config: &Config,
    max_pages: Option<usize>,
    print_items: bool,
    out: W,
) -> Result<usize> {
    let source = spec.open(config.viewer.synthetic_latency)?;
    let (requests, worker) = spawn_worker(source);
    let surface = DumpSurface {
        out,
        print_items,
        printed: 0,
        failure: None,
        io_error: None,
    };
    let mut engine = Engine::new(config.engine.clone(), requests, surface);

    let mut pages = 0;
    engine.start();
    while engine.is_fetching() {
        let Some(result) = worker.recv_timeout(PAGE_TIMEOUT) else {
            bail!("timed out waiting for page {}", engine.current_page());
        };
        let page = result.page;
        let before = engine.session().previous_accepted_page();
        engine.handle_response(result);

        if let Some(failure) = engine.surface_mut().failure.take() {
            bail!("fetch failed: {failure}");
        }
        if let Some(e) = engine.surface_mut().io_error.take() {
            return Err(e.into());
        }
        if engine.session().previous_accepted_page() != before {
            pages += 1;
            debug!("dump: accepted page {page}");
        }
        if max_pages.is_some_and(|m| pages >= m) {
            break;
        }
        // Scroll through every known row, as a surface displaying them would.
        for position in 0..engine.dataset_len().max(1) {
            if engine.trigger_fetch_if_needed(position) {
                break;
            }
        }
    }

    let limited = max_pages.is_some_and(|m| pages >= m);
    if !engine.last_page_reached() && !limited {
        bail!(
            "paging stopped before page {} after {} item(s): no row reaches the fetch trigger \
             (indexing={:?}, buffer_distance={}, per_page={})",
            engine.current_page(),
            engine.dataset_len(),
            engine.modifiers().indexing,
            engine.modifiers().buffer_distance,
            engine.modifiers().per_page
        );
    }

    info!(
        "dump: {} page(s), {} item(s), last_page={}",
        pages,
        engine.dataset_len(),
        engine.last_page_reached()
    );
    Ok(engine.dataset_len())
}
