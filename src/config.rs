use std::time::Duration;

// Largest command capacity tokio's mpsc accepts
const MAX_COMMAND_BUFFER_SIZE: usize = usize::MAX >> 3;
// The broadcast ring buffer is allocated up front
pub(crate) const MAX_EVENT_BUFFER_SIZE: usize = 1 << 16;

/// Activities registered when no other list is configured
pub const DEFAULT_TIMERS: [&str; 5] = ["Break", "Meeting", "Debugging", "Task", "Other"];

/// Configuration for a [`TimerService`](crate::TimerService)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Instance name for logging
    pub name: String,

    /// How often the active timer is sampled and published
    pub tick_interval: Duration,

    /// Size of the command channel buffer
    pub command_buffer_size: usize,

    /// Number of events a subscriber may fall behind before the oldest are dropped
    pub event_buffer_size: usize,

    /// Timers registered at construction
    pub timers: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            name: "time_tracker".to_string(),
            tick_interval: Duration::from_secs(1),
            command_buffer_size: 32,
            event_buffer_size: 16,
            timers: DEFAULT_TIMERS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl TrackerConfig {
    /// Instance name used in log lines
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Period between samples of the active timer
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Size of the command channel buffer
    pub fn with_command_buffer_size(mut self, size: usize) -> Self {
        self.command_buffer_size = size;
        self
    }

    /// Number of events a subscriber may fall behind, capped at 65536
    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Replace the initial timer list
    pub fn with_timers<I, S>(mut self, timers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timers = timers.into_iter().map(Into::into).collect();
        self
    }

    // Channels panic outside these bounds, intervals on zero
    pub(crate) fn normalized(mut self) -> Self {
        self.command_buffer_size = self.command_buffer_size.clamp(1, MAX_COMMAND_BUFFER_SIZE);
        self.event_buffer_size = self.event_buffer_size.clamp(1, MAX_EVENT_BUFFER_SIZE);
        if self.tick_interval.is_zero() {
            self.tick_interval = Duration::from_millis(1);
        }
        self
    }
}
