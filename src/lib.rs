//! # Time Tracker
//!
//! Track wall-clock time against a small set of named activities, built on top of Tokio.
//!
//! At most one activity is timed at any instant. Activating a timer stops the
//! one that was running, and the running timer is sampled once per tick and
//! published to every subscriber.
//!
//! ## Features
//!
//! - **Single Active Timer**: Switching activities stops the previous timer before starting the next
//! - **Accumulated Durations**: Each timer keeps its total across start/stop cycles
//! - **One Clock**: A single heartbeat samples the active timer, no task per timer
//! - **Bounded Event Stream**: Slow subscribers lose the oldest events, never the newest
//! - **Graceful Shutdown**: Support for cancellation tokens and clean shutdowns
//!
//! ## Quick Start
//!
//! ```rust
//! use time_tracker::{CancellationToken, TimerEvent, TimerService, TrackerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cancel_token = CancellationToken::new();
//!
//!     // Registers the default activities: Break, Meeting, Debugging, Task, Other
//!     let (service, handle) = TimerService::new(TrackerConfig::default(), cancel_token.clone())?;
//!     let mut events = service.subscribe();
//!
//!     // Spawn the service task
//!     tokio::spawn(service.run());
//!
//!     handle.activate_timer("Meeting").await?;
//!
//!     // Wait for the first sample
//!     while let Some(event) = events.recv().await {
//!         if let TimerEvent::Tick { name, elapsed, .. } = event {
//!             println!("{} running for {:?}", name, elapsed);
//!             break;
//!         }
//!     }
//!
//!     let stopped = handle.stop_current_timer().await?;
//!     println!("{:?}", stopped);
//!
//!     // Shutdown gracefully
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod event;
mod service;
mod timer;

pub use config::{TrackerConfig, DEFAULT_TIMERS};
pub use error::{Result, TrackerError};
pub use event::{EventStream, TimerEvent};
pub use service::{TimerService, TrackerHandle, TrackerSummary};
pub use timer::{format_hms, Timer, TimerSnapshot, TimerState};

// Re-export commonly used types for convenience
pub use std::time::Duration;
pub use tokio_util::sync::CancellationToken;
