//! Viewer state: layout, cursor/viewport, the terminal list surface, redraw.

use log::debug;

use super::terminal;
use crate::delta::IndexDelta;
use crate::engine::Engine;
use crate::source::{Record, record_label};
use crate::surface::ListSurface;

// ---------------------------------------------------------------------------
// Layout / ViewState
// ---------------------------------------------------------------------------

pub(super) struct Layout {
    pub cols: u16,
    pub list_rows: u16,  // rows available to the list (= term_rows - 1)
    pub status_row: u16, // status bar row (= term_rows - 1)
}

pub(super) fn compute_layout(term_cols: u16, term_rows: u16) -> Layout {
    Layout {
        cols: term_cols,
        list_rows: term_rows.saturating_sub(1).max(1),
        status_row: term_rows.saturating_sub(1),
    }
}

/// Cursor and first visible row, both as list positions.
pub(super) struct ViewState {
    pub cursor: usize,
    pub top: usize,
}

impl ViewState {
    pub(super) fn new() -> Self {
        Self { cursor: 0, top: 0 }
    }

    /// Move the cursor to `target` (clamped) and scroll just enough to keep it
    /// on screen.
    pub(super) fn move_to(&mut self, target: usize, row_count: usize, list_rows: usize) {
        let old = self.cursor;
        self.cursor = target.min(row_count.saturating_sub(1));
        let list_rows = list_rows.max(1);
        if self.cursor < self.top {
            self.top = self.cursor;
        } else if self.cursor >= self.top + list_rows {
            self.top = self.cursor + 1 - list_rows;
        }
        debug!(
            "cursor: {old} -> {} (top={}, rows={row_count})",
            self.cursor, self.top
        );
    }

    pub(super) fn move_by(&mut self, delta: isize, row_count: usize, list_rows: usize) {
        let target = self.cursor.saturating_add_signed(delta);
        self.move_to(target, row_count, list_rows);
    }
}

/// Data shown in the status bar.
pub(super) struct StatusLine<'a> {
    pub name: &'a str,
    pub cursor: usize,
    pub rows: usize,
    pub page: usize,
    pub fetching: bool,
    pub last_page: bool,
}

// ---------------------------------------------------------------------------
// TerminalSurface: ListSurface for the text list
// ---------------------------------------------------------------------------

/// Blank line-number gutter for rows without an item.
const GUTTER: &str = "      ";

/// Renders rows as text lines and remembers what changed since the last frame.
pub(super) struct TerminalSurface {
    /// Set by every notification; cleared by the event loop after redraw.
    pub dirty: bool,
    /// Short description of the last change, shown as a flash message.
    pub last_change: Option<String>,
    /// Set when a fetch fails; redraws stop feeding positions to the engine
    /// until the next key event clears it.
    pub hold_triggers: bool,
}

impl TerminalSurface {
    pub(super) fn new() -> Self {
        Self {
            dirty: true,
            last_change: None,
            hold_triggers: false,
        }
    }
}

impl ListSurface<Record> for TerminalSurface {
    type Cell = String;

    fn on_delta_computed(&mut self, delta: Option<&IndexDelta>) {
        self.dirty = true;
        self.last_change = Some(match delta {
            None => "reloaded".to_string(),
            Some(d) if d.is_empty() => "no new rows".to_string(),
            Some(d) => format!("+{} row(s), {} redrawn", d.insert.len(), d.reload.len()),
        });
    }

    fn on_dataset_changed(&mut self, dataset: &[Record]) {
        self.dirty = true;
        self.hold_triggers = false;
        debug!("surface: dataset now {} item(s)", dataset.len());
    }

    fn cell(&mut self, position: usize, item: Option<&Record>, placeholder: bool) -> String {
        match item {
            Some(record) => format!("{:>6}  {}", position + 1, record_label(record)),
            None if placeholder => format!("{GUTTER}  ·····"),
            None => String::new(),
        }
    }

    fn loading_cell(&mut self, _position: usize) -> String {
        format!("{GUTTER}  loading…")
    }

    fn on_fetch_failed(&mut self, page: usize, error: &anyhow::Error) {
        self.dirty = true;
        self.hold_triggers = true;
        self.last_change = Some(format!("page {page} failed: {error}"));
    }
}

/// Lines occupied by the loading row.
fn loading_lines(engine: &Engine<Record, TerminalSurface>) -> usize {
    let h = engine.loading_cell_height();
    if h.is_finite() && h > 1.0 { h.ceil() as usize } else { 1 }
}

/// Build the visible lines, starting at `state.top`.
///
/// Every position put on screen is reported to the engine, which issues the
/// next fetch when the trigger position comes into view. After a failed fetch
/// nothing is reported until the surface's `hold_triggers` is cleared. Returns
/// the lines and the index of the cursor line, if visible.
pub(super) fn visible_lines(
    engine: &mut Engine<Record, TerminalSurface>,
    state: &ViewState,
    layout: &Layout,
) -> (Vec<String>, Option<usize>) {
    let capacity = layout.list_rows as usize;
    let mut lines = Vec::with_capacity(capacity);
    let mut selected = None;
    let mut position = state.top;
    let report = !engine.surface().hold_triggers;

    while lines.len() < capacity {
        let Some(cell) = engine.cell_at(position) else {
            break;
        };
        if position == state.cursor {
            selected = Some(lines.len());
        }
        let is_loading = position == engine.dataset_len() && !engine.dataset().is_empty();
        lines.push(cell);
        if is_loading {
            for _ in 1..loading_lines(engine) {
                lines.push(String::new());
            }
        }
        if report && position < engine.dataset_len() {
            engine.trigger_fetch_if_needed(position);
        }
        position += 1;
    }
    if report && engine.dataset().is_empty() {
        // Placeholders only: the first page is wanted whatever is on screen.
        engine.trigger_fetch_if_needed(state.top);
    }
    lines.truncate(capacity);
    (lines, selected)
}

/// Full redraw: list rows + status bar.
pub(super) fn redraw(
    engine: &mut Engine<Record, TerminalSurface>,
    layout: &Layout,
    state: &ViewState,
    name: &str,
    acc_peek: Option<u32>,
    flash: Option<&str>,
) -> anyhow::Result<()> {
    let (lines, selected) = visible_lines(engine, state, layout);
    terminal::draw_rows(layout, &lines, selected)?;
    let status = StatusLine {
        name,
        cursor: state.cursor,
        rows: engine.row_count(),
        page: engine.current_page(),
        fetching: engine.is_fetching(),
        last_page: engine.last_page_reached(),
    };
    terminal::draw_status_bar(layout, &status, acc_peek, flash)?;
    Ok(())
}
