//! Terminal I/O layer: raw mode, list rows, status bar.

use crossterm::{
    ExecutableCommand, QueueableCommand, cursor,
    style::{self, Stylize},
    terminal,
};
use std::io::{self, Write, stdout};

use super::state::{Layout, StatusLine};

// ---------------------------------------------------------------------------
// RawGuard: restores raw mode / alternate screen on every exit path
// ---------------------------------------------------------------------------

pub(super) struct RawGuard {
    cleaned: bool,
}

impl RawGuard {
    pub(super) fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        stdout().execute(terminal::EnterAlternateScreen)?;
        stdout().execute(cursor::Hide)?;
        Ok(Self { cleaned: false })
    }

    pub(super) fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let mut out = stdout();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Fit `text` into exactly `width` columns (truncate or pad).
pub(super) fn fit(text: &str, width: usize) -> String {
    let mut s: String = text.chars().take(width).collect();
    let len = s.chars().count();
    s.extend(std::iter::repeat_n(' ', width - len));
    s
}

/// Draw the list area. `selected` is the index into `lines` to highlight.
pub(super) fn draw_rows(
    layout: &Layout,
    lines: &[String],
    selected: Option<usize>,
) -> io::Result<()> {
    let mut out = stdout();
    let width = layout.cols as usize;
    for row in 0..layout.list_rows {
        out.queue(cursor::MoveTo(0, row))?;
        let text = lines.get(row as usize).map(String::as_str).unwrap_or("");
        let padded = fit(text, width);
        if selected == Some(row as usize) {
            write!(out, "{}", padded.reverse())?;
        } else {
            write!(out, "{padded}")?;
        }
    }
    out.queue(style::ResetColor)?;
    out.flush()
}

pub(super) fn draw_status_bar(
    layout: &Layout,
    status: &StatusLine<'_>,
    acc_peek: Option<u32>,
    flash: Option<&str>,
) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, layout.status_row))?;

    let position = format!("{}/{}", status.cursor + 1, status.rows);
    let fetch = if status.fetching {
        format!("fetching p{}", status.page)
    } else if status.last_page {
        "end".to_string()
    } else {
        format!("next p{}", status.page)
    };

    let middle = if let Some(msg) = flash {
        format!(" {} | {} | {position} {fetch}", status.name, msg)
    } else if let Some(n) = acc_peek {
        format!(" {} | :{n}_ | {position} {fetch}", status.name)
    } else {
        format!(
            " {} | {position} {fetch}  [j/k d/u Ng:goto r:refresh R:reset q:quit]",
            status.name
        )
    };

    let padded = fit(&middle, layout.cols as usize);
    write!(out, "{}", padded.on_dark_grey().white())?;
    out.queue(style::ResetColor)?;
    out.flush()
}

pub(super) fn check_tty() -> anyhow::Result<()> {
    use std::io::IsTerminal;
    // Only stdout matters. crossterm's `use-dev-tty` reads keyboard from /dev/tty
    // (Unix) or Console API (Windows), so stdin being a pipe is always fine.
    if !io::stdout().is_terminal() {
        anyhow::bail!(
            "infiniscroll viewer requires an interactive terminal.\n\
             \n\
             To page through a source without a terminal, use: infiniscroll dump <source>"
        );
    }
    Ok(())
}
