//! Input processing layer: key mapping and numeric prefix accumulator.
//!
//! Pure logic, no I/O. All functions are deterministic and testable.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const MAX_COUNT: u32 = 999_999;

/// Accumulated numeric prefix for vim/less-style commands.
///
/// Users type digits then a command character: `12g` jumps to page 12,
/// `10j` scrolls 10 steps down, `3n` moves three pages forward.
pub(super) struct InputAccumulator {
    count: Option<u32>,
}

impl InputAccumulator {
    pub(super) fn new() -> Self {
        Self { count: None }
    }

    /// Feed a digit. Digits that would overflow the count are ignored.
    fn push_digit(&mut self, d: u32) {
        let current = self.count.unwrap_or(0);
        let new = current.saturating_mul(10).saturating_add(d);
        if new <= MAX_COUNT {
            self.count = Some(new);
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
    ScrollDown(u32),
    ScrollUp(u32),
    HalfPageDown(u32),
    HalfPageUp(u32),
    NextPage(u32),
    PrevPage(u32),
    FirstPage,
    LastPage,
    GoToPage(u32),
    ZoomIn,
    ZoomOut,
    ResetZoom,
    CancelInput,
    /// A digit was accumulated; caller should redraw status bar.
    Digit,
}

/// Map a key event to an `Action`, consuming/updating the accumulator as needed.
///
/// Returns `None` for unknown keys (caller should reset accumulator).
pub(super) fn map_key_event(key: KeyEvent, acc: &mut InputAccumulator) -> Option<Action> {
    let KeyEvent { code, modifiers, .. } = key;

    match (code, modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            Some(Action::Quit)
        }

        (KeyCode::Esc, _) => {
            acc.reset();
            Some(Action::CancelInput)
        }

        // A bare 0 resets zoom; inside a count it is a digit.
        (KeyCode::Char('0'), KeyModifiers::NONE) if !acc.is_active() => Some(Action::ResetZoom),

        (KeyCode::Char(c @ '0'..='9'), KeyModifiers::NONE) => {
            acc.push_digit(c as u32 - '0' as u32);
            Some(Action::Digit)
        }

        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => {
            Some(Action::ScrollDown(acc.take().unwrap_or(1)))
        }
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => {
            Some(Action::ScrollUp(acc.take().unwrap_or(1)))
        }
        (KeyCode::Char('d'), _) => Some(Action::HalfPageDown(acc.take().unwrap_or(1))),
        (KeyCode::Char('u'), _) => Some(Action::HalfPageUp(acc.take().unwrap_or(1))),

        (KeyCode::Char('n'), _) | (KeyCode::Char('J'), _) | (KeyCode::PageDown, _) => {
            Some(Action::NextPage(acc.take().unwrap_or(1)))
        }
        (KeyCode::Char('p'), _) | (KeyCode::Char('K'), _) | (KeyCode::PageUp, _) => {
            Some(Action::PrevPage(acc.take().unwrap_or(1)))
        }

        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => match acc.take() {
            None => Some(Action::FirstPage),
            Some(n) => Some(Action::GoToPage(n)),
        },
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => match acc.take() {
            None => Some(Action::LastPage),
            Some(n) => Some(Action::GoToPage(n)),
        },

        (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => {
            acc.reset();
            Some(Action::ZoomIn)
        }
        (KeyCode::Char('-'), _) => {
            acc.reset();
            Some(Action::ZoomOut)
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
    fn test_5j_scroll_down() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('5')), &mut acc);
        assert_eq!(a, Some(Action::Digit));
        let a = map_key_event(simple_key(KeyCode::Char('j')), &mut acc);
        assert_eq!(a, Some(Action::ScrollDown(5)));
    }

    #[test]
    fn test_g_without_prefix_goes_to_first_page() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('g')), &mut acc);
        assert_eq!(a, Some(Action::FirstPage));
    }

    #[test]
    fn test_12g_goes_to_page() {
        let mut acc = InputAccumulator::new();
        map_key_event(simple_key(KeyCode::Char('1')), &mut acc);
        map_key_event(simple_key(KeyCode::Char('2')), &mut acc);
        let a = map_key_event(simple_key(KeyCode::Char('g')), &mut acc);
        assert_eq!(a, Some(Action::GoToPage(12)));
    }

    #[test]
    fn test_zero_inside_count_is_a_digit() {
        let mut acc = InputAccumulator::new();
        map_key_event(simple_key(KeyCode::Char('1')), &mut acc);
        let a = map_key_event(simple_key(KeyCode::Char('0')), &mut acc);
        assert_eq!(a, Some(Action::Digit));
        let a = map_key_event(simple_key(KeyCode::Char('G')), &mut acc);
        assert_eq!(a, Some(Action::GoToPage(10)));
    }

    #[test]
    fn test_bare_zero_resets_zoom() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('0')), &mut acc);
        assert_eq!(a, Some(Action::ResetZoom));
    }

    #[test]
    fn test_zoom_keys() {
        let mut acc = InputAccumulator::new();
        let plus = map_key_event(key(KeyCode::Char('+'), KeyModifiers::SHIFT), &mut acc);
        assert_eq!(plus, Some(Action::ZoomIn));
        let eq = map_key_event(simple_key(KeyCode::Char('=')), &mut acc);
        assert_eq!(eq, Some(Action::ZoomIn));
        let minus = map_key_event(simple_key(KeyCode::Char('-')), &mut acc);
        assert_eq!(minus, Some(Action::ZoomOut));
    }

    #[test]
    fn test_page_keys_take_counts() {
        let mut acc = InputAccumulator::new();
        map_key_event(simple_key(KeyCode::Char('3')), &mut acc);
        let a = map_key_event(simple_key(KeyCode::Char('n')), &mut acc);
        assert_eq!(a, Some(Action::NextPage(3)));
        let a = map_key_event(key(KeyCode::Char('K'), KeyModifiers::SHIFT), &mut acc);
        assert_eq!(a, Some(Action::PrevPage(1)));
    }

    #[test]
    fn test_q_quits() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('q')), &mut acc);
        assert_eq!(a, Some(Action::Quit));
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(key(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut acc);
        assert_eq!(a, Some(Action::Quit));
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
    fn test_unknown_key_returns_none() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('x')), &mut acc);
        assert!(a.is_none());
    }

    #[test]
    fn test_big_g_last_page() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(key(KeyCode::Char('G'), KeyModifiers::SHIFT), &mut acc);
        assert_eq!(a, Some(Action::LastPage));
    }
}
