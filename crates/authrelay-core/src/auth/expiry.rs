use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::{Clock, Session, SystemClock, Token};

/// Whether `token` is still usable at `now`. Expiry is exclusive:
/// a token is dead at the exact instant it expires.
pub fn is_valid_at(token: &Token, now: DateTime<Utc>) -> bool {
    now < token.expires_at()
}

/// Decides whether held credentials are still usable.
#[derive(Clone)]
pub struct ExpiryPolicy {
    clock: Arc<dyn Clock>,
}

impl ExpiryPolicy {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn is_valid(&self, token: Option<&Token>) -> bool {
        token.is_some_and(|t| is_valid_at(t, self.clock.now()))
    }

    pub fn is_logged_in(&self, session: &Session) -> bool {
        self.is_valid(session.access_token.as_ref())
    }

    /// Time left before `token` expires, never negative.
    pub fn time_until_expiry(&self, token: &Token) -> Duration {
        (token.expires_at() - self.clock.now()).max(Duration::zero())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, token: &Token) -> i64 {
        self.time_until_expiry(token).num_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ManualClock;
    use chrono::TimeZone;

    fn fixture() -> (Arc<ManualClock>, ExpiryPolicy, Token) {
        let start = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let policy = ExpiryPolicy::new(clock.clone());
        let token = Token::new("access", start, start + Duration::minutes(30)).unwrap();
        (clock, policy, token)
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let (clock, policy, token) = fixture();
        assert!(policy.is_valid(Some(&token)));

        clock.set(token.expires_at() - Duration::milliseconds(1));
        assert!(policy.is_valid(Some(&token)));

        clock.set(token.expires_at());
        assert!(!policy.is_valid(Some(&token)));

        clock.advance(Duration::milliseconds(1));
        assert!(!policy.is_valid(Some(&token)));
    }

    #[test]
    fn test_absent_token_is_never_valid() {
        let (_, policy, _) = fixture();
        assert!(!policy.is_valid(None));
        assert!(!policy.is_logged_in(&Session::default()));
    }

    #[test]
    fn test_logged_in_follows_access_token() {
        let (clock, policy, token) = fixture();
        let session = Session {
            user: None,
            access_token: Some(token.clone()),
            refresh_token: Some(token.clone()),
        };
        assert!(policy.is_logged_in(&session));
        clock.advance(Duration::hours(1));
        assert!(!policy.is_logged_in(&session));
    }

    #[test]
    fn test_time_until_expiry_clamps_at_zero() {
        let (clock, policy, token) = fixture();
        assert_eq!(policy.minutes_until_expiry(&token), 30);
        clock.advance(Duration::hours(2));
        assert_eq!(policy.time_until_expiry(&token), Duration::zero());
    }
}
