use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Upper bound on how long a barrier waits between predicate rechecks.
    /// Wake-ups and predicate changes are not guaranteed to pair 1:1, so the
    /// barrier never parks indefinitely.
    pub poll_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}
