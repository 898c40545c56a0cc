//! Decode window predicate

use chrono::{DateTime, Duration, Utc};

use crate::model::ProtectedEvent;

/// Permits reconstruction only shortly before an event starts
///
/// `now` is inside the window iff `0 < start - now <= window`. Once the start
/// time has passed the window is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGate {
    window: Duration,
}

impl TimeGate {
    pub const DEFAULT_WINDOW_MINUTES: u32 = 5;

    #[must_use]
    pub fn new(window_minutes: u32) -> Self {
        Self {
            window: Duration::minutes(i64::from(window_minutes)),
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn is_within_window(&self, event: &ProtectedEvent, now: DateTime<Utc>) -> bool {
        self.admits(event.starts_at(), now)
    }

    /// Same predicate on a raw start instant
    #[must_use]
    pub fn admits(&self, starts_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let remaining = starts_at - now;
        remaining > Duration::zero() && remaining <= self.window
    }
}

impl Default for TimeGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW_MINUTES)
    }
}
