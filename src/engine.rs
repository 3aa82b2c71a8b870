//! Fetch engine: decides when to request the next page, validates what comes
//! back, merges it and tells the list surface what changed.
//!
//! Lifecycle of one page:
//!
//! 1. the surface reports a scroll position ([`Engine::trigger_fetch_if_needed`]);
//! 2. if the position is at the trigger point, a [`PageRequest`] goes to the
//!    fetch worker and the in-flight latch is set;
//! 3. the owner drains the worker and hands each [`FetchResult`] to
//!    [`Engine::handle_response`];
//! 4. the response is checked against the [`Session`] (token + strict page
//!    order). Rejected responses are logged and dropped;
//! 5. accepted items are appended, an [`IndexDelta`] is computed, and the
//!    surface is notified.
//!
//! At most one request is in flight per session. The latch remembers the
//! `(session, page)` it was set for, so a reset can drop it immediately
//! without waiting for the old request to come back.

use std::sync::mpsc;

use log::{debug, error, info, trace, warn};
use serde::Deserialize;

use crate::delta::IndexDelta;
use crate::session::{Session, SessionToken};
use crate::source::{FetchResult, PageRequest, ResponsePayload};
use crate::surface::ListSurface;

pub const DEFAULT_BUFFER_DISTANCE: usize = 5;
pub const DEFAULT_PLACEHOLDER_CELLS: usize = 10;
pub const DEFAULT_PER_PAGE: usize = 20;
pub const DEFAULT_LOADING_CELL_HEIGHT: f64 = 1.0;

/// How scroll positions are addressed, which selects the prefetch trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingMode {
    /// Fetch when the last known item is about to be shown.
    #[default]
    Row,
    /// Fetch `buffer_distance` items before the end.
    Section,
}

/// Engine options. Also forwarded to the data source with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct Modifiers {
    /// Never compute index deltas; the surface always redraws everything.
    pub force_reload: bool,
    pub indexing: IndexingMode,
    /// Lookahead for [`IndexingMode::Section`].
    pub buffer_distance: usize,
    /// Height of the trailing loading row, in surface units.
    pub loading_cell_height: f64,
    /// Rows shown before the first page arrives.
    pub placeholder_cells: usize,
    /// Page size requested from the source.
    pub per_page: usize,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            force_reload: false,
            indexing: IndexingMode::Row,
            buffer_distance: DEFAULT_BUFFER_DISTANCE,
            loading_cell_height: DEFAULT_LOADING_CELL_HEIGHT,
            placeholder_cells: DEFAULT_PLACEHOLDER_CELLS,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    session: SessionToken,
    page: usize,
}

pub struct Engine<T, S> {
    modifiers: Modifiers,
    session: Session,
    data: Vec<T>,
    surface: S,
    requests: mpsc::Sender<PageRequest>,
    in_flight: Option<InFlight>,
    refreshing: bool,
}

impl<T, S: ListSurface<T>> Engine<T, S> {
    /// Create an engine with a fresh session. No request is sent until
    /// [`Engine::start`] or a qualifying scroll event.
    pub fn new(modifiers: Modifiers, requests: mpsc::Sender<PageRequest>, surface: S) -> Self {
        let session = Session::new();
        info!(
            "engine: new session {} (indexing={:?}, per_page={}, force_reload={})",
            session.token(),
            modifiers.indexing,
            modifiers.per_page,
            modifiers.force_reload
        );
        Self {
            modifiers,
            session,
            data: Vec::new(),
            surface,
            requests,
            in_flight: None,
            refreshing: false,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dataset(&self) -> &[T] {
        &self.data
    }

    pub fn dataset_len(&self) -> usize {
        self.data.len()
    }

    pub fn current_page(&self) -> usize {
        self.session.current_page()
    }

    pub fn last_page_reached(&self) -> bool {
        self.session.last_page_reached()
    }

    /// Whether a request for the current session is outstanding.
    pub fn is_fetching(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|f| &f.session == self.session.token())
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn loading_cell_height(&self) -> f64 {
        self.modifiers.loading_cell_height
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    // -- fetching -----------------------------------------------------------

    /// Issue the first page of the current session.
    pub fn start(&mut self) -> bool {
        self.perform_fetch()
    }

    /// Whether `position` is the prefetch trigger point for the current dataset.
    ///
    /// An empty dataset always wants its first page, whatever the position.
    pub fn is_trigger_position(&self, position: usize) -> bool {
        let len = self.data.len();
        if len == 0 {
            return true;
        }
        match self.modifiers.indexing {
            IndexingMode::Row => position == len - 1,
            IndexingMode::Section => {
                len.checked_sub(self.modifiers.buffer_distance) == Some(position)
            }
        }
    }

    /// Fetch the next page if `position` is the trigger point.
    ///
    /// Safe to call on every scroll event: no-op after the last page and while
    /// a request is outstanding. Returns whether a request was sent.
    pub fn trigger_fetch_if_needed(&mut self, position: usize) -> bool {
        if !self.is_trigger_position(position) {
            return false;
        }
        trace!("engine: trigger at position {position} (len={})", self.data.len());
        self.perform_fetch()
    }

    /// Request `current_page` from the source.
    pub fn perform_fetch(&mut self) -> bool {
        if self.session.last_page_reached() {
            trace!("engine: last page reached, not fetching");
            return false;
        }
        if self.is_fetching() {
            trace!("engine: page {} already in flight", self.session.current_page());
            return false;
        }
        self.dispatch(self.session.current_page())
    }

    /// User-initiated refresh: request page 1 again under the same session.
    ///
    /// The current rows stay visible until page 1 is accepted, at which point
    /// they are replaced. Overrides the in-flight latch and the last-page flag.
    pub fn refresh(&mut self) -> bool {
        if self.refreshing && self.is_fetching() {
            debug!("engine: refresh already in progress");
            return false;
        }
        info!("engine: refresh requested (session {})", self.session.token());
        self.refreshing = true;
        self.in_flight = None;
        let sent = self.dispatch(1);
        if !sent {
            self.refreshing = false;
        }
        sent
    }

    fn dispatch(&mut self, page: usize) -> bool {
        let request = PageRequest {
            page,
            modifiers: self.modifiers.clone(),
            session: self.session.token().clone(),
        };
        if self.requests.send(request).is_err() {
            error!("engine: fetch worker is gone, cannot request page {page}");
            return false;
        }
        debug!("engine: requested page {page} (session {})", self.session.token());
        self.in_flight = Some(InFlight {
            session: self.session.token().clone(),
            page,
        });
        true
    }

    /// Completion callback for one fetch. Must be called on the owner's thread.
    pub fn handle_response(&mut self, result: FetchResult<T>) {
        let FetchResult {
            page,
            session,
            outcome,
        } = result;

        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.session == session && f.page == page)
        {
            self.in_flight = None;
        }

        match outcome {
            Ok(payload) => self.accept(page, payload),
            Err(e) => {
                if session != *self.session.token() {
                    debug!("engine: ignoring failure of page {page} from previous session");
                    return;
                }
                error!("engine: page {page} failed: {e:#}");
                if self.refreshing && page == 1 {
                    self.refreshing = false;
                }
                self.surface.on_fetch_failed(page, &e);
            }
        }
    }

    fn accept(&mut self, page: usize, payload: ResponsePayload<T>) {
        if let Err(rejection) = self.session.validate(&payload.session, page, self.refreshing) {
            debug!("engine: rejected page {page}: {rejection}");
            return;
        }

        let replaced = self.refreshing && page == 1;
        if replaced {
            self.refreshing = false;
            self.data.clear();
            self.session.rewind();
        }
        self.session
            .advance(payload.last_page, payload.total, payload.per_page);

        let items = payload.items;
        if items.len() != payload.count {
            warn!(
                "engine: page {page} reports count={} but carries {} item(s), using the latter",
                payload.count,
                items.len()
            );
        }

        let delta = if self.modifiers.force_reload || replaced {
            None
        } else {
            Some(IndexDelta::for_append(
                self.data.len(),
                items.len(),
                self.modifiers.placeholder_cells,
            ))
        };

        self.data.extend(items);
        info!(
            "engine: merged page {page} -> {} item(s) total (last_page={})",
            self.data.len(),
            self.session.last_page_reached()
        );

        self.surface.on_delta_computed(delta.as_ref());
        self.surface.on_dataset_changed(&self.data);
    }

    /// Drop all data and start a new session. Responses to requests issued
    /// before the reset are discarded when they arrive.
    pub fn reset_data(&mut self) {
        self.data.clear();
        self.session.reset();
        self.in_flight = None;
        self.refreshing = false;
        info!("engine: reset (session {})", self.session.token());
        self.surface.on_delta_computed(None);
        self.surface.on_dataset_changed(&self.data);
    }

    // -- surface row model --------------------------------------------------

    /// Number of rows the surface should show: placeholders before the first
    /// page, otherwise the items plus a loading row while more may follow.
    pub fn row_count(&self) -> usize {
        let more = !self.session.last_page_reached();
        if self.data.is_empty() && more && self.modifiers.placeholder_cells > 0 {
            return self.modifiers.placeholder_cells;
        }
        self.data.len() + usize::from(more)
    }

    /// Build the cell for `position` through the surface hooks.
    pub fn cell_at(&mut self, position: usize) -> Option<S::Cell> {
        if let Some(item) = self.data.get(position) {
            return Some(self.surface.cell(position, Some(item), false));
        }
        let more = !self.session.last_page_reached();
        if self.data.is_empty() && more && position < self.modifiers.placeholder_cells {
            return Some(self.surface.cell(position, None, true));
        }
        if more && position == self.data.len() {
            return Some(self.surface.loading_cell(position));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        deltas: Vec<Option<IndexDelta>>,
        dataset_sizes: Vec<usize>,
        failures: Vec<usize>,
    }

    impl ListSurface<u32> for Recorder {
        type Cell = String;

        fn on_delta_computed(&mut self, delta: Option<&IndexDelta>) {
            self.deltas.push(delta.cloned());
        }

        fn on_dataset_changed(&mut self, dataset: &[u32]) {
            self.dataset_sizes.push(dataset.len());
        }

        fn cell(&mut self, position: usize, item: Option<&u32>, placeholder: bool) -> String {
            match item {
                Some(v) => format!("{position}:{v}"),
                None if placeholder => format!("{position}:placeholder"),
                None => format!("{position}:empty"),
            }
        }

        fn loading_cell(&mut self, position: usize) -> String {
            format!("{position}:loading")
        }

        fn on_fetch_failed(&mut self, page: usize, _error: &anyhow::Error) {
            self.failures.push(page);
        }
    }

    fn engine(modifiers: Modifiers) -> (Engine<u32, Recorder>, mpsc::Receiver<PageRequest>) {
        let (tx, rx) = mpsc::channel();
        (Engine::new(modifiers, tx, Recorder::default()), rx)
    }

    fn respond(req: &PageRequest, n: u32, total: usize) -> FetchResult<u32> {
        let base = req.offset() as u32;
        let items = (base..base + n).collect();
        FetchResult {
            page: req.page,
            session: req.session.clone(),
            outcome: Ok(ResponsePayload::for_request(req, items, total, false)),
        }
    }

    fn small() -> Modifiers {
        Modifiers {
            per_page: 4,
            placeholder_cells: 2,
            ..Modifiers::default()
        }
    }

    #[test]
    fn latch_blocks_duplicate_requests() {
        let (mut e, rx) = engine(small());
        assert!(e.start());
        assert!(!e.trigger_fetch_if_needed(0));
        assert!(!e.perform_fetch());
        assert_eq!(rx.try_iter().count(), 1);
        assert!(e.is_fetching());
    }

    #[test]
    fn latch_clears_on_response() {
        let (mut e, rx) = engine(small());
        e.start();
        let req = rx.try_recv().unwrap();
        e.handle_response(respond(&req, 4, 100));
        assert!(!e.is_fetching());
        assert!(e.trigger_fetch_if_needed(3));
        assert_eq!(rx.try_recv().unwrap().page, 2);
    }

    #[test]
    fn delta_splits_at_placeholders() {
        let (mut e, rx) = engine(small());
        e.start();
        let req = rx.try_recv().unwrap();
        e.handle_response(respond(&req, 4, 100));
        assert_eq!(
            e.surface().deltas,
            vec![Some(IndexDelta {
                reload: vec![0, 1],
                insert: vec![2, 3],
            })]
        );
        assert_eq!(e.surface().dataset_sizes, vec![4]);
    }

    #[test]
    fn failure_keeps_page_and_allows_retry() {
        let (mut e, rx) = engine(small());
        e.start();
        let req = rx.try_recv().unwrap();
        e.handle_response(FetchResult {
            page: req.page,
            session: req.session.clone(),
            outcome: Err(anyhow::anyhow!("connection refused")),
        });
        assert_eq!(e.surface().failures, vec![1]);
        assert_eq!(e.current_page(), 1);
        assert!(!e.is_fetching());
        assert!(e.trigger_fetch_if_needed(0));
        assert_eq!(rx.try_recv().unwrap().page, 1);
    }

    #[test]
    fn stale_failure_is_ignored() {
        let (mut e, rx) = engine(small());
        e.start();
        let old = rx.try_recv().unwrap();
        e.reset_data();
        e.handle_response(FetchResult {
            page: old.page,
            session: old.session.clone(),
            outcome: Err(anyhow::anyhow!("timeout")),
        });
        assert!(e.surface().failures.is_empty());
    }

    #[test]
    fn reset_drops_latch_immediately() {
        let (mut e, rx) = engine(small());
        e.start();
        e.reset_data();
        assert!(!e.is_fetching());
        assert!(e.start());
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn row_model_before_and_after_first_page() {
        let (mut e, rx) = engine(small());
        assert_eq!(e.row_count(), 2);
        assert_eq!(e.cell_at(1).as_deref(), Some("1:placeholder"));
        assert_eq!(e.cell_at(2), None);

        e.start();
        let req = rx.try_recv().unwrap();
        e.handle_response(respond(&req, 4, 100));
        assert_eq!(e.row_count(), 5);
        assert_eq!(e.cell_at(0).as_deref(), Some("0:0"));
        assert_eq!(e.cell_at(4).as_deref(), Some("4:loading"));
        assert_eq!(e.cell_at(5), None);
    }

    #[test]
    fn no_loading_row_after_last_page() {
        let (mut e, rx) = engine(small());
        e.start();
        let req = rx.try_recv().unwrap();
        // total < per_page ends the data
        e.handle_response(respond(&req, 3, 3));
        assert!(e.last_page_reached());
        assert_eq!(e.row_count(), 3);
        assert_eq!(e.cell_at(3), None);
    }

    #[test]
    fn refresh_replaces_dataset() {
        let (mut e, rx) = engine(small());
        e.start();
        let p1 = rx.try_recv().unwrap();
        e.handle_response(respond(&p1, 4, 100));
        e.trigger_fetch_if_needed(3);
        let p2 = rx.try_recv().unwrap();
        e.handle_response(respond(&p2, 4, 100));
        assert_eq!(e.dataset_len(), 8);

        assert!(e.refresh());
        assert!(e.is_refreshing());
        let r1 = rx.try_recv().unwrap();
        assert_eq!(r1.page, 1);
        assert_eq!(&r1.session, e.session().token());

        e.handle_response(respond(&r1, 4, 100));
        assert!(!e.is_refreshing());
        assert_eq!(e.dataset_len(), 4);
        assert_eq!(e.current_page(), 2);
        assert_eq!(e.session().previous_accepted_page(), 1);
        assert_eq!(e.surface().deltas.last(), Some(&None));
    }

    #[test]
    fn refresh_failure_keeps_rows() {
        let (mut e, rx) = engine(small());
        e.start();
        let p1 = rx.try_recv().unwrap();
        e.handle_response(respond(&p1, 4, 100));

        e.refresh();
        let r1 = rx.try_recv().unwrap();
        e.handle_response(FetchResult {
            page: r1.page,
            session: r1.session.clone(),
            outcome: Err(anyhow::anyhow!("offline")),
        });
        assert!(!e.is_refreshing());
        assert_eq!(e.dataset_len(), 4);
        assert_eq!(e.current_page(), 2);
    }

    #[test]
    fn refresh_works_after_last_page() {
        let (mut e, rx) = engine(small());
        e.start();
        let p1 = rx.try_recv().unwrap();
        e.handle_response(respond(&p1, 2, 2));
        assert!(e.last_page_reached());
        assert!(e.refresh());
        assert_eq!(rx.try_recv().unwrap().page, 1);
    }

    #[test]
    fn closed_worker_does_not_latch() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut e: Engine<u32, Recorder> = Engine::new(small(), tx, Recorder::default());
        assert!(!e.start());
        assert!(!e.is_fetching());
    }

    #[test]
    fn count_mismatch_uses_items() {
        let (mut e, rx) = engine(small());
        e.start();
        let req = rx.try_recv().unwrap();
        let mut result = respond(&req, 3, 100);
        if let Ok(p) = result.outcome.as_mut() {
            p.count = 4;
        }
        e.handle_response(result);
        assert_eq!(e.dataset_len(), 3);
        assert_eq!(
            e.surface().deltas[0].as_ref().map(IndexDelta::len),
            Some(3)
        );
    }
}
