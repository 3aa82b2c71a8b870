//! Input processing layer: key mapping and numeric prefix accumulator.
//!
//! Pure logic, no I/O. All functions are deterministic and testable.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const MAX_COUNT: u32 = 999_999;

/// Accumulated numeric prefix for vim/less-style commands.
///
/// `56g` jumps to row 56, `10j` moves the cursor 10 rows down. A count typed
/// before `r` or `R` is discarded.
pub(super) struct InputAccumulator {
    count: Option<u32>,
}

impl InputAccumulator {
    pub(super) fn new() -> Self {
        Self { count: None }
    }

    /// Append a digit (0..=9). Digits that would exceed `MAX_COUNT` are dropped.
    fn push_digit(&mut self, d: u32) {
        let next = self.count.unwrap_or(0).saturating_mul(10).saturating_add(d);
        if next <= MAX_COUNT {
            self.count = Some(next);
        }
    }

    /// Take the accumulated count, resetting to None.
    fn take(&mut self) -> Option<u32> {
        self.count.take()
    }

    /// Peek at the current accumulated count without consuming it.
    pub(super) fn peek(&self) -> Option<u32> {
        self.count
    }

    pub(super) fn reset(&mut self) {
        self.count = None;
    }

    pub(super) fn is_active(&self) -> bool {
        self.count.is_some()
    }
}

/// Actions produced by key input processing.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Action {
    Quit,
    Down(u32),
    Up(u32),
    HalfPageDown(u32),
    HalfPageUp(u32),
    JumpToTop,
    JumpToBottom,
    /// 1-based row.
    JumpToRow(u32),
    /// Pull-to-refresh: reload page 1, keep the session.
    Refresh,
    /// Drop everything and start a new session.
    Reset,
    CancelInput,
    /// A digit was accumulated; caller should redraw status bar.
    Digit,
}

/// Map a key event to an `Action`, consuming/updating the accumulator as needed.
///
/// Returns `None` for unknown keys (caller should reset accumulator).
pub(super) fn map_key_event(key: KeyEvent, acc: &mut InputAccumulator) -> Option<Action> {
    let KeyEvent {
        code, modifiers, ..
    } = key;

    match (code, modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Action::Quit),

        (KeyCode::Esc, _) => {
            acc.reset();
            Some(Action::CancelInput)
        }

        (KeyCode::Char(c @ '0'..='9'), KeyModifiers::NONE) => {
            acc.push_digit(c as u32 - '0' as u32);
            Some(Action::Digit)
        }

        (KeyCode::Char('d'), KeyModifiers::CONTROL) | (KeyCode::PageDown, _) => {
            Some(Action::HalfPageDown(acc.take().unwrap_or(1)))
        }
        (KeyCode::Char('u'), KeyModifiers::CONTROL) | (KeyCode::PageUp, _) => {
            Some(Action::HalfPageUp(acc.take().unwrap_or(1)))
        }
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Action::Down(acc.take().unwrap_or(1))),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Action::Up(acc.take().unwrap_or(1))),
        (KeyCode::Char('d'), _) => Some(Action::HalfPageDown(acc.take().unwrap_or(1))),
        (KeyCode::Char('u'), _) => Some(Action::HalfPageUp(acc.take().unwrap_or(1))),

        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => match acc.take() {
            None => Some(Action::JumpToTop),
            Some(n) => Some(Action::JumpToRow(n)),
        },
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => match acc.take() {
            None => Some(Action::JumpToBottom),
            Some(n) => Some(Action::JumpToRow(n)),
        },

        (KeyCode::Char('r'), _) => {
            acc.reset();
            Some(Action::Refresh)
        }
        (KeyCode::Char('R'), _) => {
            acc.reset();
            Some(Action::Reset)
        }

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn simple_key(code: KeyCode) -> KeyEvent {
        key(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_5j_moves_down() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('5')), &mut acc);
        assert_eq!(a, Some(Action::Digit));
        let a = map_key_event(simple_key(KeyCode::Char('j')), &mut acc);
        assert_eq!(a, Some(Action::Down(5)));
        assert!(!acc.is_active());
    }

    #[test]
    fn test_g_without_prefix_jumps_top() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('g')), &mut acc);
        assert_eq!(a, Some(Action::JumpToTop));
    }

    #[test]
    fn test_42g_jumps_to_row() {
        let mut acc = InputAccumulator::new();
        map_key_event(simple_key(KeyCode::Char('4')), &mut acc);
        map_key_event(simple_key(KeyCode::Char('2')), &mut acc);
        let a = map_key_event(simple_key(KeyCode::Char('g')), &mut acc);
        assert_eq!(a, Some(Action::JumpToRow(42)));
    }

    #[test]
    fn test_big_g_bottom() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(key(KeyCode::Char('G'), KeyModifiers::SHIFT), &mut acc);
        assert_eq!(a, Some(Action::JumpToBottom));
    }

    #[test]
    fn test_ctrl_d_half_page() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(key(KeyCode::Char('d'), KeyModifiers::CONTROL), &mut acc);
        assert_eq!(a, Some(Action::HalfPageDown(1)));
    }

    #[test]
    fn test_q_and_ctrl_c_quit() {
        let mut acc = InputAccumulator::new();
        assert_eq!(map_key_event(simple_key(KeyCode::Char('q')), &mut acc), Some(Action::Quit));
        assert_eq!(
            map_key_event(key(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut acc),
            Some(Action::Quit)
        );
    }

    #[test]
    fn test_refresh_and_reset() {
        let mut acc = InputAccumulator::new();
        map_key_event(simple_key(KeyCode::Char('3')), &mut acc);
        assert_eq!(map_key_event(simple_key(KeyCode::Char('r')), &mut acc), Some(Action::Refresh));
        assert!(!acc.is_active(), "refresh discards a pending count");
        assert_eq!(
            map_key_event(key(KeyCode::Char('R'), KeyModifiers::SHIFT), &mut acc),
            Some(Action::Reset)
        );
    }

    #[test]
    fn test_esc_cancels_input() {
        let mut acc = InputAccumulator::new();
        map_key_event(simple_key(KeyCode::Char('5')), &mut acc);
        assert!(acc.is_active());
        let a = map_key_event(simple_key(KeyCode::Esc), &mut acc);
        assert_eq!(a, Some(Action::CancelInput));
        assert!(!acc.is_active());
    }

    #[test]
    fn test_overflow_ignored() {
        let mut acc = InputAccumulator::new();
        for _ in 0..8 {
            map_key_event(simple_key(KeyCode::Char('9')), &mut acc);
        }
        assert_eq!(acc.peek(), Some(999_999));
    }

    #[test]
    fn test_unknown_key_returns_none() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('x')), &mut acc);
        assert!(a.is_none());
    }
}
