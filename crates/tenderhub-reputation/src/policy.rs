use chrono::Duration;

/// Blacklist thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlacklistPolicy {
    /// Qualifying warnings needed before a user may be blacklisted.
    pub threshold: usize,
    /// Length of a blacklist entry, in days.
    pub days: i64,
}

impl BlacklistPolicy {
    pub fn is_eligible(&self, warning_count: usize) -> bool {
        warning_count >= self.threshold
    }

    pub fn duration(&self) -> Duration {
        Duration::days(self.days)
    }
}

impl Default for BlacklistPolicy {
    fn default() -> Self {
        Self {
            threshold: 2,
            days: 365,
        }
    }
}
