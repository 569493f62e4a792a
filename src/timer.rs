use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Result, TrackerError};

/// Timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerState {
    Idle,
    Running,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerState::Idle => write!(f, "idle"),
            TimerState::Running => write!(f, "running"),
        }
    }
}

/// A named stopwatch accumulating running time across start/stop cycles.
///
/// The timer does not own a clock. Every transition takes the current instant
/// from the caller, which lets the tracker sample all timers against a single
/// time source.
#[derive(Debug, Clone)]
pub struct Timer {
    name: String,
    state: TimerState,

    /// Beginning of the current run, only set while running
    started_at: Option<Instant>,

    /// End of the last completed run, cleared on start
    ended_at: Option<Instant>,

    /// Sum of all completed runs
    total: Duration,
}

impl Timer {
    /// Create an idle timer with nothing accumulated
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TimerState::Idle,
            started_at: None,
            ended_at: None,
            total: Duration::ZERO,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Accumulated time of all completed runs
    pub fn total_duration(&self) -> Duration {
        self.total
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<Instant> {
        self.ended_at
    }

    /// Start a new run at `now`.
    ///
    /// Starting a running timer is an [`TrackerError::InvalidTransition`].
    pub fn start(&mut self, now: Instant) -> Result<()> {
        if self.is_active() {
            return Err(TrackerError::InvalidTransition {
                name: self.name.clone(),
                state: self.state,
            });
        }

        self.state = TimerState::Running;
        self.started_at = Some(now);
        self.ended_at = None;
        log::debug!("Timer '{}' started, total so far {:?}", self.name, self.total);
        Ok(())
    }

    /// Stop the current run at `now` and fold it into the total.
    ///
    /// Returns the length of the closed run, or `None` if the timer was idle.
    pub fn stop(&mut self, now: Instant) -> Option<Duration> {
        if !self.is_active() {
            return None;
        }

        let diff = self.current_duration(now);
        self.total += diff;
        self.state = TimerState::Idle;
        self.started_at = None;
        self.ended_at = Some(now);
        log::debug!(
            "Timer '{}' stopped after {:?}, total {:?}",
            self.name,
            diff,
            self.total
        );
        Some(diff)
    }

    /// Elapsed time of the current run, zero when idle
    pub fn current_duration(&self, now: Instant) -> Duration {
        match (self.state, self.started_at) {
            (TimerState::Running, Some(started_at)) => now.saturating_duration_since(started_at),
            _ => Duration::ZERO,
        }
    }

    /// Total including the current run
    pub fn effective_total(&self, now: Instant) -> Duration {
        self.total + self.current_duration(now)
    }

    pub fn snapshot(&self, now: Instant) -> TimerSnapshot {
        TimerSnapshot {
            name: self.name.clone(),
            state: self.state,
            total: self.total,
            current: self.current_duration(now),
        }
    }
}

/// Point-in-time copy of a timer for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub name: String,
    pub state: TimerState,
    /// Accumulated time of completed runs
    pub total: Duration,
    /// Elapsed time of the current run, zero when idle
    pub current: Duration,
}

impl TimerSnapshot {
    pub fn is_active(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn effective_total(&self) -> Duration {
        self.total + self.current
    }
}

impl fmt::Display for TimerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, format_hms(self.effective_total()))?;
        if self.is_active() {
            write!(f, " (tracking)")?;
        }
        Ok(())
    }
}

/// Format a duration as `HH:MM:SS`, truncating sub-second parts.
///
/// Hours keep counting past 24.
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}
