//! Terminal list viewer driving an [`Engine`] over a data source.
//!
//! Layout:
//!   row 0..term_rows-1 : list rows (items, placeholders, loading row)
//!   row term_rows-1    : status bar
//!
//! Threads:
//!   The data source runs on the fetch worker. This loop owns the engine,
//!   drains finished fetches with `try_recv()` between input events, and
//!   redraws at most once per frame budget. Every row put on screen is
//!   reported to the engine, which is how scrolling triggers the next page.

mod input;
mod state;
mod terminal;

use crossterm::{
    event::{self, Event},
    terminal as crossterm_terminal,
};
use log::{debug, info};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::engine::Engine;
use crate::source::{FetchWorker, Record, SourceSpec, spawn_worker};
use crate::watch::FileWatcher;

use input::{Action, InputAccumulator, map_key_event};
use state::{TerminalSurface, ViewState};

/// Poll interval while a fetch is outstanding or a file is watched.
const BUSY_POLL: Duration = Duration::from_millis(50);

/// Run the terminal viewer until the user quits.
pub fn run(spec: SourceSpec, config: Config, watch: bool) -> anyhow::Result<()> {
    terminal::check_tty()?;

    let name = spec.display_name();
    let source = spec.open(config.viewer.synthetic_latency)?;
    let (requests, worker): (_, FetchWorker<Record>) = spawn_worker(source);

    let mut watcher = match spec.watch_path() {
        Some(path) if watch => Some(FileWatcher::new(path, config.viewer.watch_interval)?),
        _ => None,
    };

    let (term_cols, term_rows) = crossterm_terminal::size()
        .map_err(|e| anyhow::anyhow!("failed to get terminal size: {e}"))?;
    let mut layout = state::compute_layout(term_cols, term_rows);

    let mut engine = Engine::new(config.engine.clone(), requests, TerminalSurface::new());
    engine.start();

    let mut guard = terminal::RawGuard::enter()?;
    let mut view = ViewState::new();
    let mut acc = InputAccumulator::new();
    // Flash message (e.g. "+20 row(s)"), cleared on next keypress
    let mut flash_msg: Option<String> = None;
    let mut last_render = Instant::now();
    let step = config.viewer.scroll_step.max(1) as isize;

    loop {
        // Drain finished fetches into the engine.
        while let Some(result) = worker.try_recv() {
            debug!("main: received page {}", result.page);
            engine.handle_response(result);
        }
        if let Some(w) = watcher.as_mut()
            && w.has_changed()
        {
            info!("viewer: source changed on disk, resetting");
            engine.reset_data();
            view = ViewState::new();
            engine.start();
        }
        if let Some(change) = engine.surface_mut().last_change.take() {
            flash_msg = Some(change);
        }

        let dirty = engine.surface().dirty;
        let timeout = if dirty {
            config.viewer.frame_budget.saturating_sub(last_render.elapsed())
        } else if engine.is_fetching() || watcher.is_some() {
            BUSY_POLL
        } else {
            Duration::from_secs(86400)
        };

        if event::poll(timeout)? {
            let ev = event::read()?;
            debug!("event: {:?}", ev);

            let had_flash = flash_msg.take().is_some();
            if matches!(ev, Event::Key(_)) && engine.surface().hold_triggers {
                // User input after a failure: let the visible rows ask again.
                engine.surface_mut().hold_triggers = false;
                engine.surface_mut().dirty = true;
            }
            let rows = engine.row_count();
            let list_rows = layout.list_rows as usize;
            let half = (list_rows / 2).max(1) as isize;

            match ev {
                Event::Key(key_event) => match map_key_event(key_event, &mut acc) {
                    Some(Action::Quit) => break,
                    Some(Action::CancelInput) | Some(Action::Digit) => {
                        engine.surface_mut().dirty = true;
                    }
                    Some(Action::Down(n)) => {
                        view.move_by(step * n as isize, rows, list_rows);
                        engine.surface_mut().dirty = true;
                    }
                    Some(Action::Up(n)) => {
                        view.move_by(-step * n as isize, rows, list_rows);
                        engine.surface_mut().dirty = true;
                    }
                    Some(Action::HalfPageDown(n)) => {
                        view.move_by(half * n as isize, rows, list_rows);
                        engine.surface_mut().dirty = true;
                    }
                    Some(Action::HalfPageUp(n)) => {
                        view.move_by(-half * n as isize, rows, list_rows);
                        engine.surface_mut().dirty = true;
                    }
                    Some(Action::JumpToTop) => {
                        view.move_to(0, rows, list_rows);
                        engine.surface_mut().dirty = true;
                    }
                    Some(Action::JumpToBottom) => {
                        view.move_to(usize::MAX, rows, list_rows);
                        engine.surface_mut().dirty = true;
                    }
                    Some(Action::JumpToRow(n)) => {
                        view.move_to((n as usize).saturating_sub(1), rows, list_rows);
                        engine.surface_mut().dirty = true;
                    }
                    Some(Action::Refresh) => {
                        if engine.refresh() {
                            flash_msg = Some("refreshing…".into());
                        }
                        engine.surface_mut().dirty = true;
                    }
                    Some(Action::Reset) => {
                        engine.reset_data();
                        view = ViewState::new();
                        engine.start();
                    }
                    None => {
                        if acc.is_active() {
                            acc.reset();
                        }
                        if had_flash {
                            engine.surface_mut().dirty = true;
                        }
                    }
                },
                Event::Resize(new_cols, new_rows) => {
                    debug!("resize: {new_cols}x{new_rows}");
                    layout = state::compute_layout(new_cols, new_rows);
                    let cursor = view.cursor;
                    view.move_to(cursor, engine.row_count(), layout.list_rows as usize);
                    engine.surface_mut().dirty = true;
                }
                _ => {}
            }
            continue;
        }

        // poll timeout → frame budget elapsed, execute redraw
        if engine.surface().dirty {
            engine.surface_mut().dirty = false;
            state::redraw(
                &mut engine,
                &layout,
                &view,
                &name,
                acc.peek(),
                flash_msg.as_deref(),
            )?;
            last_render = Instant::now();
        }
    }

    // Dropping the engine drops the request sender → worker exits after its
    // current fetch.
    guard.cleanup();
    Ok(())
}
