use std::time::Duration;

/// Default interval between driver ticks.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Maximum number of finished entries retained in history.
pub const DEFAULT_FINISHED_CAPACITY: usize = 1000;

/// Tuning knobs for a [`JobQueue`](crate::JobQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub tick: Duration,
    pub finished_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            finished_capacity: DEFAULT_FINISHED_CAPACITY,
        }
    }
}

impl QueueConfig {
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_finished_capacity(mut self, capacity: usize) -> Self {
        self.finished_capacity = capacity;
        self
    }
}
