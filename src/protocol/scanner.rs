//! Header terminator scanner.
//!
//! A four-state automaton over single bytes that recognises the blank line
//! (`\r\n\r\n`) ending the proxy's response headers.
//!
//! ```text
//!         \r        \n        \r        \n
//!   [0] ------> [1] ------> [2] ------> [3] ------> [4] terminal
//!    ^           |           |           |
//!    |  other    |  \r -> 1  |  other    |  \r -> 1
//!    +-----------+-----------+-----------+  other -> 0
//! ```
//!
//! On a mismatch, a `\r` restarts the match at state 1 instead of 0. That
//! way a stray CR (`...\r\r\n\r\n`) still counts as the first byte of a
//! fresh candidate terminator.

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const TERMINATOR: [u8; 4] = [CR, LF, CR, LF];

/// Number of terminator bytes matched so far, 0 through 4.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScanState(u8);

impl ScanState {
    /// Fresh state, nothing matched.
    pub const START: Self = Self(0);

    /// Headers complete.
    pub const TERMINAL: Self = Self(4);

    /// Matched byte count.
    pub fn matched(self) -> u8 {
        self.0
    }

    /// Check if the full terminator has been seen.
    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }
}

/// Advance the automaton by one byte.
///
/// The terminal state absorbs every further byte.
pub fn next(state: ScanState, byte: u8) -> ScanState {
    if state.is_terminal() {
        return state;
    }
    if byte == TERMINATOR[state.0 as usize] {
        ScanState(state.0 + 1)
    } else if byte == CR {
        ScanState(1)
    } else {
        ScanState::START
    }
}

/// Automaton state plus the number of bytes fed into it.
#[derive(Debug, Clone, Default)]
pub struct HeaderScanner {
    state: ScanState,
    consumed: usize,
}

impl HeaderScanner {
    /// Create a scanner in the start state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, returning `true` once the terminator is complete.
    pub fn feed(&mut self, byte: u8) -> bool {
        if !self.state.is_terminal() {
            self.state = next(self.state, byte);
            self.consumed += 1;
        }
        self.state.is_terminal()
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Bytes fed before reaching the terminal state (or so far).
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Check if the terminator has been seen.
    pub fn is_complete(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn steps_to_terminal(bytes: &[u8]) -> Option<usize> {
        let mut scanner = HeaderScanner::new();
        bytes.iter().position(|&b| scanner.feed(b)).map(|i| i + 1)
    }

    #[test]
    fn test_plain_terminator_in_four_steps() {
        assert_eq!(steps_to_terminal(b"\r\n\r\n"), Some(4));
    }

    #[test]
    fn test_stray_cr_resets_to_one() {
        // The second CR breaks the CR-LF match and restarts at state 1.
        let mut state = next(ScanState::START, b'\r');
        assert_eq!(state.matched(), 1);
        state = next(state, b'\r');
        assert_eq!(state.matched(), 1);

        assert_eq!(steps_to_terminal(b"\r\r\n\r\n"), Some(5));
    }

    #[test]
    fn test_cr_at_state_three_resets_to_one() {
        let mut state = ScanState::START;
        for &b in b"\r\n\r" {
            state = next(state, b);
        }
        assert_eq!(state.matched(), 3);
        state = next(state, b'\r');
        assert_eq!(state.matched(), 1);

        assert_eq!(steps_to_terminal(b"\r\n\r\r\n\r\n"), Some(7));
    }

    #[test]
    fn test_other_byte_resets_to_zero() {
        let mut state = ScanState::START;
        for &b in b"\r\n" {
            state = next(state, b);
        }
        assert_eq!(next(state, b'X'), ScanState::START);
        assert_eq!(next(state, b'\n'), ScanState::START);
    }

    #[test]
    fn test_full_response_headers() {
        let response = b" Connection established\r\nProxy-Agent: test\r\n\r\nPAYLOAD";
        let consumed = steps_to_terminal(response).unwrap();
        assert_eq!(&response[consumed..], b"PAYLOAD");
    }

    #[test]
    fn test_terminal_absorbs() {
        let mut scanner = HeaderScanner::new();
        for &b in b"\r\n\r" {
            assert!(!scanner.feed(b));
        }
        assert!(scanner.feed(b'\n'));
        assert!(scanner.is_complete());
        assert!(scanner.feed(b'x'));
        assert_eq!(scanner.consumed(), 4);
        assert_eq!(next(ScanState::TERMINAL, b'x'), ScanState::TERMINAL);
    }

    #[test]
    fn test_single_crlf_not_terminal() {
        assert_eq!(steps_to_terminal(b"HTTP/1.1 200 OK\r\nVia: x\r\n"), None);
        assert_eq!(steps_to_terminal(b"\n\r\n\r"), None);
        assert_eq!(steps_to_terminal(b"\r\n\n\r\n"), None);
    }

    /// Reference: does `bytes` contain `\r\n\r\n` as a contiguous run?
    fn contains_terminator(bytes: &[u8]) -> Option<usize> {
        bytes.windows(4).position(|w| w == TERMINATOR).map(|p| p + 4)
    }

    proptest! {
        #[test]
        fn prop_matches_substring_search(
            bytes in proptest::collection::vec(
                prop_oneof![Just(b'\r'), Just(b'\n'), Just(b'a')],
                0..64,
            )
        ) {
            prop_assert_eq!(steps_to_terminal(&bytes), contains_terminator(&bytes));
        }

        #[test]
        fn prop_state_stays_in_range(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut state = ScanState::START;
            for b in bytes {
                state = next(state, b);
                prop_assert!(state.matched() <= 4);
            }
        }
    }
}
