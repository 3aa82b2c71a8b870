//! Byte-driven engine session shared by the fuzz target and `reproduce`.
//!
//! Each input byte picks one event (scroll, answer, stale answer, failure, reset
//! or refresh) and the engine invariants are checked after every
//! step. Items carry the reset generation they were produced for, so a stale
//! merge shows up as a foreign generation in the dataset.

use std::collections::VecDeque;
use std::sync::mpsc;

use infiniscroll::delta::IndexDelta;
use infiniscroll::engine::{Engine, IndexingMode, Modifiers};
use infiniscroll::session::SessionToken;
use infiniscroll::source::{FetchResult, PageRequest, ResponsePayload};
use infiniscroll::surface::ListSurface;
use log::debug;

/// Item: (reset generation, page).
type Item = (u32, usize);

struct Null;

impl ListSurface<Item> for Null {
    type Cell = ();

    fn on_delta_computed(&mut self, _delta: Option<&IndexDelta>) {}

    fn on_dataset_changed(&mut self, _dataset: &[Item]) {}

    fn cell(&mut self, _position: usize, _item: Option<&Item>, _placeholder: bool) {}

    fn loading_cell(&mut self, _position: usize) {}
}

struct Issued {
    request: PageRequest,
    generation: u32,
}

pub fn run(data: &[u8]) {
    let Some((&head, ops)) = data.split_first() else {
        return;
    };
    let modifiers = Modifiers {
        force_reload: head & 0x01 != 0,
        indexing: if head & 0x02 != 0 {
            IndexingMode::Section
        } else {
            IndexingMode::Row
        },
        buffer_distance: usize::from((head >> 2) & 0x03),
        placeholder_cells: usize::from((head >> 4) & 0x03) * 2,
        per_page: usize::from(head >> 6) + 1,
        ..Modifiers::default()
    };
    let total = usize::from(head % 23);

    let (tx, rx) = mpsc::channel();
    let mut engine = Engine::new(modifiers.clone(), tx, Null);
    let mut generation = 0u32;
    let mut pending: VecDeque<Issued> = VecDeque::new();

    let mut bytes = ops.iter().copied();
    while let Some(op) = bytes.next() {
        let arg = usize::from(bytes.next().unwrap_or(0));
        let before = engine.session().previous_accepted_page();
        let refreshing = engine.is_refreshing();

        match op % 8 {
            0 => {
                let position = arg % (engine.dataset_len() + 2);
                let was_fetching = engine.is_fetching();
                let was_last = engine.last_page_reached();
                let sent = engine.trigger_fetch_if_needed(position);
                assert!(!(sent && (was_fetching || was_last)), "duplicate or post-end fetch");
            }
            1 | 7 => {
                let issued = if op % 8 == 1 {
                    pending.pop_front()
                } else {
                    pending.pop_back()
                };
                if let Some(issued) = issued {
                    engine.handle_response(answer(&issued, total));
                }
            }
            2 => {
                let foreign = SessionToken::from("foreign");
                let items = vec![(u32::MAX, 1); modifiers.per_page];
                engine.handle_response(FetchResult {
                    page: engine.current_page(),
                    session: foreign.clone(),
                    outcome: Ok(ResponsePayload {
                        count: items.len(),
                        items,
                        per_page: modifiers.per_page,
                        total,
                        last_page: false,
                        session: foreign,
                    }),
                });
                assert_eq!(engine.session().previous_accepted_page(), before);
            }
            3 => {
                // Duplicate delivery of the oldest outstanding page.
                if let Some(issued) = pending.front() {
                    engine.handle_response(answer(issued, total));
                }
            }
            4 => {
                if let Some(issued) = pending.pop_front() {
                    let page_before = engine.current_page();
                    engine.handle_response(FetchResult {
                        page: issued.request.page,
                        session: issued.request.session.clone(),
                        outcome: Err(anyhow::anyhow!("injected failure")),
                    });
                    assert_eq!(engine.current_page(), page_before);
                }
            }
            5 => {
                engine.reset_data();
                generation += 1;
                assert_eq!(engine.current_page(), 1);
                assert_eq!(engine.session().previous_accepted_page(), 0);
                assert!(!engine.is_fetching());
            }
            6 => {
                engine.refresh();
            }
            _ => unreachable!(),
        }

        while let Ok(request) = rx.try_recv() {
            debug!("script: issued page {}", request.page);
            pending.push_back(Issued {
                request,
                generation,
            });
        }

        let after = engine.session().previous_accepted_page();
        assert!(
            after == before
                || after == before + 1
                || (refreshing && after == 1)
                || (op % 8 == 5 && after == 0),
            "accepted page jumped {before} -> {after}"
        );
        assert!(
            engine.dataset().iter().all(|&(g, _)| g == generation),
            "dataset holds items from another session"
        );
        assert!(engine.current_page() >= 1);
    }
}

fn answer(issued: &Issued, total: usize) -> FetchResult<Item> {
    let req = &issued.request;
    let start = req.offset().min(total);
    let end = (start + req.modifiers.per_page).min(total);
    let items = vec![(issued.generation, req.page); end - start];
    FetchResult {
        page: req.page,
        session: req.session.clone(),
        outcome: Ok(ResponsePayload::for_request(req, items, total, end >= total)),
    }
}
