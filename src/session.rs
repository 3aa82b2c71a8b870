//! Session and page tracking: which page to request next, which page was
//! merged last, and whether a response still belongs to the current session.
//!
//! Network responses can arrive late, twice, or after the user reset the
//! list. Every request carries the session token it was issued under; a reset
//! regenerates the token so anything still in flight is discarded on arrival
//! (soft cancellation). Within one session, pages are only accepted in strict
//! `previous + 1` order.

use std::fmt;

use log::{debug, warn};
use rand::Rng;
use rand::distributions::Alphanumeric;
use thiserror::Error;

const TOKEN_LEN: usize = 32;

/// Opaque identifier of one continuous browsing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random token.
    ///
    /// Uniqueness across resets is all that matters here; the token is never
    /// used as a secret.
    pub fn generate() -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionToken {
    /// Shortened form for log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(8).collect();
        write!(f, "{short}")
    }
}

/// Why a response was refused. Rejections are reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("response belongs to a previous session")]
    StaleSession,
    #[error("page {page} is out of order (expected {expected})")]
    OutOfOrderPage { page: usize, expected: usize },
}

/// Page counters and session token for one engine.
#[derive(Debug)]
pub struct Session {
    token: SessionToken,
    current_page: usize,
    previous_accepted_page: usize,
    last_page_reached: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            token: SessionToken::generate(),
            current_page: 1,
            previous_accepted_page: 0,
            last_page_reached: false,
        }
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Next page to request (1-based).
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Highest page merged so far in this session (0 = none).
    pub fn previous_accepted_page(&self) -> usize {
        self.previous_accepted_page
    }

    pub fn last_page_reached(&self) -> bool {
        self.last_page_reached
    }

    /// Start a new session. Anything issued under the old token is now stale.
    pub fn reset(&mut self) {
        let old = std::mem::replace(&mut self.token, SessionToken::generate());
        self.current_page = 1;
        self.previous_accepted_page = 0;
        self.last_page_reached = false;
        debug!("session: reset {old} -> {}", self.token);
    }

    /// Restart paging at page 1 under the same token (pull-to-refresh).
    pub(crate) fn rewind(&mut self) {
        self.current_page = 1;
        self.last_page_reached = false;
    }

    /// Check a response against the session and the page ordering rule.
    ///
    /// On acceptance `previous_accepted_page` moves to `page`. A user-initiated
    /// refresh answering with page 1 is always accepted (if the token matches).
    pub fn validate(
        &mut self,
        token: &SessionToken,
        page: usize,
        user_initiated_refresh: bool,
    ) -> Result<(), Rejection> {
        if *token != self.token {
            warn!(
                "session: discarding page {page} from previous session {token} (current {})",
                self.token
            );
            return Err(Rejection::StaleSession);
        }

        if user_initiated_refresh && page == 1 {
            debug!(
                "session: refresh accepted page 1 (previous={})",
                self.previous_accepted_page
            );
            self.previous_accepted_page = 1;
            return Ok(());
        }

        let expected = self.previous_accepted_page + 1;
        if page == expected {
            self.previous_accepted_page = page;
            Ok(())
        } else {
            if page <= self.previous_accepted_page {
                warn!(
                    "session: duplicate page {page}, already processed up to {}",
                    self.previous_accepted_page
                );
            } else {
                warn!("session: page {page} arrived ahead of page {expected}, discarding");
            }
            Err(Rejection::OutOfOrderPage { page, expected })
        }
    }

    /// Move to the next page after an accepted response.
    ///
    /// A page whose `total` is smaller than `per_page` is treated as the end
    /// of the data even if the source did not flag it.
    pub fn advance(&mut self, last_page: bool, total: usize, per_page: usize) {
        self.current_page += 1;
        self.last_page_reached = last_page || total < per_page;
        debug!(
            "session: advanced to page {} (last_page={}, total={total}, per_page={per_page})",
            self.current_page, self.last_page_reached
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_page_one() {
        let s = Session::new();
        assert_eq!(s.current_page(), 1);
        assert_eq!(s.previous_accepted_page(), 0);
        assert!(!s.last_page_reached());
        assert_eq!(s.token().as_str().len(), TOKEN_LEN);
    }

    #[test]
    fn tokens_differ_across_resets() {
        let mut s = Session::new();
        let first = s.token().clone();
        s.reset();
        assert_ne!(&first, s.token());
    }

    #[test]
    fn accepts_pages_in_order() {
        let mut s = Session::new();
        let token = s.token().clone();
        for page in 1..=4 {
            assert_eq!(s.validate(&token, page, false), Ok(()));
            assert_eq!(s.previous_accepted_page(), page);
        }
    }

    #[test]
    fn rejects_duplicate_page() {
        let mut s = Session::new();
        let token = s.token().clone();
        s.validate(&token, 1, false).unwrap();
        assert_eq!(
            s.validate(&token, 1, false),
            Err(Rejection::OutOfOrderPage { page: 1, expected: 2 })
        );
        assert_eq!(s.previous_accepted_page(), 1);
    }

    #[test]
    fn rejects_skipped_page() {
        let mut s = Session::new();
        let token = s.token().clone();
        assert_eq!(
            s.validate(&token, 2, false),
            Err(Rejection::OutOfOrderPage { page: 2, expected: 1 })
        );
        assert_eq!(s.previous_accepted_page(), 0);
    }

    #[test]
    fn rejects_foreign_token_regardless_of_page() {
        let mut s = Session::new();
        let stale = SessionToken::from("not-the-session");
        assert_eq!(s.validate(&stale, 1, false), Err(Rejection::StaleSession));
        assert_eq!(s.validate(&stale, 1, true), Err(Rejection::StaleSession));
        assert_eq!(s.previous_accepted_page(), 0);
    }

    #[test]
    fn refresh_page_one_always_accepted() {
        let mut s = Session::new();
        let token = s.token().clone();
        for page in 1..=5 {
            s.validate(&token, page, false).unwrap();
        }
        assert_eq!(s.validate(&token, 1, true), Ok(()));
        assert_eq!(s.previous_accepted_page(), 1);
        // Ordering resumes from the refreshed page.
        assert_eq!(s.validate(&token, 2, false), Ok(()));
    }

    #[test]
    fn refresh_flag_does_not_bypass_order_for_other_pages() {
        let mut s = Session::new();
        let token = s.token().clone();
        s.validate(&token, 1, false).unwrap();
        assert!(s.validate(&token, 3, true).is_err());
        assert_eq!(s.validate(&token, 2, true), Ok(()));
    }

    #[test]
    fn short_page_ends_data() {
        let mut s = Session::new();
        s.advance(false, 7, 10);
        assert!(s.last_page_reached());
        assert_eq!(s.current_page(), 2);
    }

    #[test]
    fn total_equal_to_per_page_does_not_end_data() {
        let mut s = Session::new();
        s.advance(false, 10, 10);
        assert!(!s.last_page_reached());
    }

    #[test]
    fn reset_restores_initial_counters() {
        let mut s = Session::new();
        let token = s.token().clone();
        s.validate(&token, 1, false).unwrap();
        s.advance(true, 10, 10);
        s.reset();
        assert_eq!(s.current_page(), 1);
        assert_eq!(s.previous_accepted_page(), 0);
        assert!(!s.last_page_reached());
        assert_eq!(s.validate(&token, 2, false), Err(Rejection::StaleSession));
    }
}
