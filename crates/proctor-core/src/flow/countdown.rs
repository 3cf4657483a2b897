use std::time::Duration;

use tokio::time::{self, Instant};

/// Phase timer anchored at its start instant.
///
/// Remaining time is always derived from the anchor, so late or skipped
/// ticks never stretch a phase.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    anchor: Instant,
    limit: Duration,
}

impl Countdown {
    /// Timer of `limit` starting now.
    pub fn start(limit: Duration) -> Self {
        Self {
            anchor: Instant::now(),
            limit,
        }
    }

    /// Configured length.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Instant the timer runs out.
    pub fn deadline(&self) -> Instant {
        self.anchor + self.limit
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.anchor.elapsed())
    }

    /// Whether the limit has passed.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Resolves at the deadline.
    pub async fn expired(&self) {
        time::sleep_until(self.deadline()).await;
    }

    /// `MM:SS`, rounded up so `00:00` only shows once expired.
    pub fn display(&self) -> String {
        let remaining = self.remaining();
        let mut secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs += 1;
        }
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}
