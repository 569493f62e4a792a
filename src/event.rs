use futures::Stream;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Timer event enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A timer became the active timer
    Started { name: String },

    /// Periodic sample of the active timer.
    ///
    /// `elapsed` covers the current run only, `total` includes all completed runs.
    Tick {
        name: String,
        elapsed: Duration,
        total: Duration,
    },

    /// The active timer was stopped and `interval` folded into `total`
    Stopped {
        name: String,
        interval: Duration,
        total: Duration,
    },
}

impl TimerEvent {
    /// Name of the timer that produced the event
    pub fn name(&self) -> &str {
        match self {
            TimerEvent::Started { name }
            | TimerEvent::Tick { name, .. }
            | TimerEvent::Stopped { name, .. } => name,
        }
    }
}

/// Subscription to a tracker's events.
///
/// The buffer is bounded. A subscriber that falls behind loses the oldest
/// events and resumes with the newest ones; the publisher never waits.
#[derive(Debug)]
pub struct EventStream {
    /// Instance name for logging
    name: String,
    event_rx: broadcast::Receiver<TimerEvent>,
}

impl EventStream {
    pub(crate) fn new(name: String, event_rx: broadcast::Receiver<TimerEvent>) -> Self {
        Self { name, event_rx }
    }

    /// Receive the next event, `None` once the tracker has shut down
    pub async fn recv(&mut self) -> Option<TimerEvent> {
        loop {
            match self.event_rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!(
                        "Subscriber of '{}' lagged, skipped {} event(s)",
                        self.name,
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv(&mut self) -> Result<TimerEvent, TryRecvError> {
        loop {
            match self.event_rx.try_recv() {
                Err(TryRecvError::Lagged(skipped)) => {
                    log::debug!(
                        "Subscriber of '{}' lagged, skipped {} event(s)",
                        self.name,
                        skipped
                    );
                }
                other => return other,
            }
        }
    }

    /// Convert into a [`Stream`] that ends when the tracker shuts down
    pub fn into_stream(self) -> impl Stream<Item = TimerEvent> + Send + Unpin {
        Box::pin(futures::stream::unfold(self, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        }))
    }
}
