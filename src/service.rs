use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::event::{EventStream, TimerEvent};
use crate::timer::{Timer, TimerSnapshot};

/// Owns all timers and the single active-timer slot.
///
/// Commands and heartbeat ticks are handled by the one task running
/// [`TimerService::run`], so switching the active timer and sampling it can
/// never interleave.
pub struct TimerService {
    /// Instance name for logging
    name: String,

    /// Channel for receiving tracker commands
    command_rx: mpsc::Receiver<TrackerCommand>,

    /// Channel for publishing timer events
    event_tx: broadcast::Sender<TimerEvent>,

    /// Timer storage: timer_name -> timer
    timers: HashMap<String, Timer>,

    /// Name of the running timer, if any
    active: Option<String>,

    /// Period between samples of the active timer
    tick_interval: Duration,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

/// Handle for controlling the timer service.
///
/// Cheap to clone. The service stops once every handle is dropped.
#[derive(Clone)]
pub struct TrackerHandle {
    /// Instance name for logging
    name: String,

    /// Channel for sending commands to the timer service
    command_tx: mpsc::Sender<TrackerCommand>,
}

/// All timers at one instant, sorted by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSummary {
    pub timers: Vec<TimerSnapshot>,
    /// Sum of the effective totals of every timer
    pub total: Duration,
}

impl TrackerSummary {
    pub fn active(&self) -> Option<&TimerSnapshot> {
        self.timers.iter().find(|timer| timer.is_active())
    }
}

#[derive(Debug)]
pub(crate) enum TrackerCommand {
    AddTimers {
        names: Vec<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveTimer {
        name: String,
        reply: oneshot::Sender<Result<TimerSnapshot>>,
    },
    ListTimers {
        reply: oneshot::Sender<Vec<String>>,
    },
    ActivateTimer {
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    StopCurrentTimer {
        reply: oneshot::Sender<Option<TimerSnapshot>>,
    },
    GetTimer {
        name: String,
        reply: oneshot::Sender<Result<TimerSnapshot>>,
    },
    ActiveTimer {
        reply: oneshot::Sender<Option<String>>,
    },
    Summary {
        reply: oneshot::Sender<TrackerSummary>,
    },
    Subscribe {
        reply: oneshot::Sender<EventStream>,
    },
    Shutdown,
}

/// What the run loop does after a command
enum Flow {
    Continue,
    /// A timer was started, realign the heartbeat with its run
    RestartClock,
    Shutdown,
}

impl TimerService {
    /// Create a new TimerService with bounded channels.
    ///
    /// The timers listed in `config` are registered immediately.
    ///
    /// Returns (TimerService, TrackerHandle)
    pub fn new(
        config: TrackerConfig,
        cancel_token: CancellationToken,
    ) -> Result<(Self, TrackerHandle)> {
        let config = config.normalized();
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer_size);
        let (event_tx, _) = broadcast::channel(config.event_buffer_size);

        let mut service = TimerService {
            name: config.name.clone(),
            command_rx,
            event_tx,
            timers: HashMap::new(),
            active: None,
            tick_interval: config.tick_interval,
            cancel_token,
        };
        service.add_timers(config.timers)?;

        let handle = TrackerHandle {
            name: config.name,
            command_tx,
        };

        Ok((service, handle))
    }

    /// Subscribe before the service is spawned so no event is missed
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.name.clone(), self.event_tx.subscribe())
    }

    /// Run the timer service
    pub async fn run(mut self) {
        let mut heartbeat = interval(self.tick_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!(
            "Timer service '{}' started with {} timer(s)",
            self.name,
            self.timers.len()
        );

        loop {
            tokio::select! {
                biased;

                // Handle cancellation token
                _ = self.cancel_token.cancelled() => {
                    log::info!("Timer service '{}' cancelled via token", self.name);
                    break;
                },

                // Handle incoming commands
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        log::info!("Timer service '{}' shutting down - all handles dropped", self.name);
                        break;
                    };
                    match self.handle_command(command) {
                        Flow::Continue => {}
                        Flow::RestartClock => heartbeat.reset(),
                        Flow::Shutdown => break,
                    }
                },

                // Sample the active timer
                _ = heartbeat.tick() => {
                    self.publish_tick();
                },
            }
        }

        self.stop_active(Instant::now());
        log::info!("Timer service '{}' stopped", self.name);
    }

    /// Handle tracker commands
    fn handle_command(&mut self, command: TrackerCommand) -> Flow {
        log::debug!("Timer service '{}' handling {:?}", self.name, command);
        let now = Instant::now();
        let mut flow = Flow::Continue;

        match command {
            TrackerCommand::AddTimers { names, reply } => {
                let result = self.add_timers(names);
                self.reply(reply, result);
            }
            TrackerCommand::RemoveTimer { name, reply } => {
                let result = self.remove_timer(&name, now);
                self.reply(reply, result);
            }
            TrackerCommand::ListTimers { reply } => {
                let names = self.list_timers();
                self.reply(reply, names);
            }
            TrackerCommand::ActivateTimer { name, reply } => {
                let result = self.activate_timer(&name, now);
                if result.is_ok() {
                    flow = Flow::RestartClock;
                }
                self.reply(reply, result);
            }
            TrackerCommand::StopCurrentTimer { reply } => {
                let stopped = self.stop_active(now);
                self.reply(reply, stopped);
            }
            TrackerCommand::GetTimer { name, reply } => {
                let result = self
                    .timers
                    .get(&name)
                    .map(|timer| timer.snapshot(now))
                    .ok_or(TrackerError::TimerNotFound(name));
                self.reply(reply, result);
            }
            TrackerCommand::ActiveTimer { reply } => {
                let active = self.active.clone();
                self.reply(reply, active);
            }
            TrackerCommand::Summary { reply } => {
                let summary = self.summary(now);
                self.reply(reply, summary);
            }
            TrackerCommand::Subscribe { reply } => {
                let events = self.subscribe();
                self.reply(reply, events);
            }
            TrackerCommand::Shutdown => {
                log::info!("Timer service '{}' shutting down", self.name);
                flow = Flow::Shutdown;
            }
        }
        flow
    }

    fn reply<T>(&self, reply: oneshot::Sender<T>, value: T) {
        if reply.send(value).is_err() {
            log::warn!("Caller of timer service '{}' went away before the reply", self.name);
        }
    }

    /// Register every name or none of them
    fn add_timers(&mut self, names: Vec<String>) -> Result<()> {
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if self.timers.contains_key(name) || !seen.insert(name.as_str()) {
                return Err(TrackerError::DuplicateTimerName(name.clone()));
            }
        }

        for name in names {
            log::info!("Timer '{}' added to service '{}'", name, self.name);
            self.timers.insert(name.clone(), Timer::new(name));
        }
        Ok(())
    }

    fn remove_timer(&mut self, name: &str, now: Instant) -> Result<TimerSnapshot> {
        if !self.timers.contains_key(name) {
            return Err(TrackerError::TimerNotFound(name.to_string()));
        }
        if self.active.as_deref() == Some(name) {
            self.stop_active(now);
        }

        let timer = self
            .timers
            .remove(name)
            .ok_or_else(|| TrackerError::TimerNotFound(name.to_string()))?;
        log::info!("Timer '{}' removed from service '{}'", name, self.name);
        Ok(timer.snapshot(now))
    }

    fn list_timers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.timers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop whatever runs, `name` included, and start a new run of `name`
    fn activate_timer(&mut self, name: &str, now: Instant) -> Result<()> {
        // Look up before touching the active timer so a bad name changes nothing
        if !self.timers.contains_key(name) {
            return Err(TrackerError::TimerNotFound(name.to_string()));
        }

        self.stop_active(now);

        let timer = self
            .timers
            .get_mut(name)
            .ok_or_else(|| TrackerError::TimerNotFound(name.to_string()))?;
        timer.start(now)?;
        self.active = Some(name.to_string());

        log::info!("Timer '{}' activated in service '{}'", name, self.name);
        self.publish(TimerEvent::Started {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Stop the active timer, if any, and publish its final numbers
    fn stop_active(&mut self, now: Instant) -> Option<TimerSnapshot> {
        let name = self.active.take()?;
        let timer = self.timers.get_mut(&name)?;
        let interval = timer.stop(now)?;
        let snapshot = timer.snapshot(now);

        log::info!(
            "Timer '{}' stopped in service '{}' after {:?}, total {:?}",
            name,
            self.name,
            interval,
            snapshot.total
        );
        self.publish(TimerEvent::Stopped {
            name,
            interval,
            total: snapshot.total,
        });
        Some(snapshot)
    }

    fn summary(&self, now: Instant) -> TrackerSummary {
        let timers: Vec<TimerSnapshot> = self
            .list_timers()
            .iter()
            .filter_map(|name| self.timers.get(name))
            .map(|timer| timer.snapshot(now))
            .collect();
        let total = timers.iter().map(TimerSnapshot::effective_total).sum();
        TrackerSummary { timers, total }
    }

    /// Publish one sample of the active timer
    fn publish_tick(&self) {
        let Some(timer) = self.active.as_ref().and_then(|name| self.timers.get(name)) else {
            return;
        };
        let now = Instant::now();
        let event = TimerEvent::Tick {
            name: timer.name().to_string(),
            elapsed: timer.current_duration(now),
            total: timer.effective_total(now),
        };
        log::debug!("Timer service '{}' tick {:?}", self.name, event);
        self.publish(event);
    }

    // Without subscribers there is nobody to tell
    fn publish(&self, event: TimerEvent) {
        self.event_tx.send(event).ok();
    }
}

impl TrackerHandle {
    /// Name of the service this handle controls
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> TrackerCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx.send(command(reply_tx)).await?;
        Ok(reply_rx.await?)
    }

    /// Register new idle timers.
    ///
    /// Fails with [`TrackerError::DuplicateTimerName`] without registering
    /// anything if a name is already taken or repeated in the batch.
    pub async fn add_timers<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.request(|reply| TrackerCommand::AddTimers { names, reply })
            .await?
    }

    pub async fn add_timer(&self, name: impl Into<String>) -> Result<()> {
        self.add_timers([name.into()]).await
    }

    /// Remove a timer, stopping it first if it is running
    pub async fn remove_timer(&self, name: impl Into<String>) -> Result<TimerSnapshot> {
        let name = name.into();
        self.request(|reply| TrackerCommand::RemoveTimer { name, reply })
            .await?
    }

    /// All timer names in sorted order
    pub async fn list_timers(&self) -> Result<Vec<String>> {
        self.request(|reply| TrackerCommand::ListTimers { reply })
            .await
    }

    /// Make `name` the only running timer.
    ///
    /// The previously active timer is stopped first. Activating the timer that
    /// is already running closes its current run and starts a new one. An
    /// unknown name fails with [`TrackerError::TimerNotFound`] and keeps the
    /// active timer running.
    pub async fn activate_timer(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.request(|reply| TrackerCommand::ActivateTimer { name, reply })
            .await?
    }

    /// Stop the active timer, returning its final snapshot if one was running
    pub async fn stop_current_timer(&self) -> Result<Option<TimerSnapshot>> {
        self.request(|reply| TrackerCommand::StopCurrentTimer { reply })
            .await
    }

    pub async fn get_timer(&self, name: impl Into<String>) -> Result<TimerSnapshot> {
        let name = name.into();
        self.request(|reply| TrackerCommand::GetTimer { name, reply })
            .await?
    }

    /// Name of the running timer, if any
    pub async fn active_timer(&self) -> Result<Option<String>> {
        self.request(|reply| TrackerCommand::ActiveTimer { reply })
            .await
    }

    pub async fn summary(&self) -> Result<TrackerSummary> {
        self.request(|reply| TrackerCommand::Summary { reply }).await
    }

    /// Subscribe to the event stream.
    ///
    /// Only events published after the subscription are delivered.
    pub async fn subscribe(&self) -> Result<EventStream> {
        self.request(|reply| TrackerCommand::Subscribe { reply })
            .await
    }

    /// Alias of [`TrackerHandle::subscribe`]
    pub async fn on_event(&self) -> Result<EventStream> {
        self.subscribe().await
    }

    /// Shutdown the timer service, stopping the active timer
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx.send(TrackerCommand::Shutdown).await?;
        Ok(())
    }

    /// Shutdown the timer service (non-blocking)
    pub fn try_shutdown(&self) -> Result<()> {
        self.command_tx
            .try_send(TrackerCommand::Shutdown)
            .map_err(|_| TrackerError::ServiceClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerState;
    use tokio::task::JoinHandle;
    use tokio::time::sleep;
    use tokio_test::{assert_err, assert_ok};

    const TOLERANCE: Duration = Duration::from_millis(50);

    fn spawn_service(timers: &[&str]) -> (TrackerHandle, JoinHandle<()>, CancellationToken) {
        let cancel_token = CancellationToken::new();
        let config = TrackerConfig::default()
            .with_name("test")
            .with_timers(timers.iter().copied());
        let (service, handle) = TimerService::new(config, cancel_token.clone()).unwrap();
        let task = tokio::spawn(service.run());
        (handle, task, cancel_token)
    }

    fn assert_close(actual: Duration, expected: Duration) {
        let diff = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            diff <= TOLERANCE,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    async fn next_tick(events: &mut EventStream) -> (String, Duration, Duration) {
        loop {
            match events.recv().await.unwrap() {
                TimerEvent::Tick {
                    name,
                    elapsed,
                    total,
                } => return (name, elapsed, total),
                _ => continue,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_wait_stop_round_trip() {
        let (handle, _task, _cancel) = spawn_service(&["X"]);
        let mut events = handle.subscribe().await.unwrap();

        handle.activate_timer("X").await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(TimerEvent::Started {
                name: "X".to_string()
            })
        );

        let mut last = Duration::ZERO;
        for expected in 1..=3 {
            let (name, elapsed, total) = next_tick(&mut events).await;
            assert_eq!(name, "X");
            assert!(elapsed >= last);
            assert_close(elapsed, Duration::from_secs(expected));
            assert_eq!(elapsed, total);
            last = elapsed;
        }

        let stopped = handle.stop_current_timer().await.unwrap().unwrap();
        assert_close(stopped.total, Duration::from_secs(3));

        let timer = handle.get_timer("X").await.unwrap();
        assert_close(timer.total, Duration::from_secs(3));
        assert!(!timer.is_active());
        assert_eq!(timer.current, Duration::ZERO);

        match events.recv().await.unwrap() {
            TimerEvent::Stopped {
                name,
                interval,
                total,
            } => {
                assert_eq!(name, "X");
                assert_close(interval, Duration::from_secs(3));
                assert_close(total, Duration::from_secs(3));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_totals_accumulate_across_runs() {
        let (handle, _task, _cancel) = spawn_service(&["X"]);

        handle.activate_timer("X").await.unwrap();
        sleep(Duration::from_secs(2)).await;
        handle.stop_current_timer().await.unwrap();

        sleep(Duration::from_secs(10)).await;

        handle.activate_timer("X").await.unwrap();
        sleep(Duration::from_secs(3)).await;

        let running = handle.get_timer("X").await.unwrap();
        assert!(running.is_active());
        assert_close(running.total, Duration::from_secs(2));
        assert_close(running.current, Duration::from_secs(3));
        assert_close(running.effective_total(), Duration::from_secs(5));

        handle.stop_current_timer().await.unwrap();
        let stopped = handle.get_timer("X").await.unwrap();
        assert_close(stopped.total, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_list_timers_sorted() {
        let (handle, _task, _cancel) = spawn_service(&["b", "c", "a"]);
        assert_eq!(handle.list_timers().await.unwrap(), vec!["a", "b", "c"]);

        handle.add_timers(["0", "bb"]).await.unwrap();
        assert_eq!(
            handle.list_timers().await.unwrap(),
            vec!["0", "a", "b", "bb", "c"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_name_leaves_timer_untouched() {
        let (handle, _task, _cancel) = spawn_service(&["X"]);
        handle.activate_timer("X").await.unwrap();
        sleep(Duration::from_secs(1)).await;

        let err = assert_err!(handle.add_timer("X").await);
        assert_eq!(err, TrackerError::DuplicateTimerName("X".to_string()));

        let timer = handle.get_timer("X").await.unwrap();
        assert!(timer.is_active());
        assert_close(timer.current, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_add_timers_is_atomic() {
        let (handle, _task, _cancel) = spawn_service(&["Task"]);

        let err = assert_err!(handle.add_timers(["New", "Task"]).await);
        assert_eq!(err, TrackerError::DuplicateTimerName("Task".to_string()));

        let err = assert_err!(handle.add_timers(["Y", "Z", "Y"]).await);
        assert_eq!(err, TrackerError::DuplicateTimerName("Y".to_string()));

        assert_eq!(handle.list_timers().await.unwrap(), vec!["Task"]);
    }

    #[test]
    fn test_duplicate_in_config_fails() {
        let config = TrackerConfig::default().with_timers(["A", "A"]);
        let result = TimerService::new(config, CancellationToken::new());
        assert!(matches!(result, Err(TrackerError::DuplicateTimerName(name)) if name == "A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_unknown_keeps_active_running() {
        let (handle, _task, _cancel) = spawn_service(&["A", "B"]);
        handle.activate_timer("A").await.unwrap();
        sleep(Duration::from_secs(2)).await;

        let err = assert_err!(handle.activate_timer("nonexistent").await);
        assert_eq!(err, TrackerError::TimerNotFound("nonexistent".to_string()));

        assert_eq!(handle.active_timer().await.unwrap(), Some("A".to_string()));
        let timer = handle.get_timer("A").await.unwrap();
        assert!(timer.is_active());
        assert_eq!(timer.total, Duration::ZERO);
        assert_close(timer.current, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_get_unknown_timer() {
        let (handle, _task, _cancel) = spawn_service(&["A"]);
        let err = assert_err!(handle.get_timer("missing").await);
        assert_eq!(err, TrackerError::TimerNotFound("missing".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_stops_previous_before_starting_next() {
        let (handle, _task, _cancel) = spawn_service(&["A", "B"]);
        let mut events = handle.subscribe().await.unwrap();

        handle.activate_timer("A").await.unwrap();
        let (name, _, _) = next_tick(&mut events).await;
        assert_eq!(name, "A");

        handle.activate_timer("B").await.unwrap();

        match events.recv().await.unwrap() {
            TimerEvent::Stopped { name, interval, .. } => {
                assert_eq!(name, "A");
                assert_close(interval, Duration::from_secs(1));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            events.recv().await,
            Some(TimerEvent::Started {
                name: "B".to_string()
            })
        );

        // Nothing from A once B is active
        for expected in 1..=3 {
            let event = events.recv().await.unwrap();
            assert_eq!(event.name(), "B");
            match event {
                TimerEvent::Tick { elapsed, .. } => {
                    assert_close(elapsed, Duration::from_secs(expected))
                }
                other => panic!("unexpected event {:?}", other),
            }
        }

        let a = handle.get_timer("A").await.unwrap();
        assert_eq!(a.state, TimerState::Idle);
        assert_close(a.total, Duration::from_secs(1));

        let summary = handle.summary().await.unwrap();
        assert_eq!(summary.active().map(|t| t.name.as_str()), Some("B"));
        assert_close(summary.total, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reactivate_running_timer_restarts_run() {
        let (handle, _task, _cancel) = spawn_service(&["A"]);
        let mut events = handle.subscribe().await.unwrap();

        handle.activate_timer("A").await.unwrap();
        sleep(Duration::from_secs(2)).await;
        handle.activate_timer("A").await.unwrap();

        // Drain the ticks of the first run
        let mut stopped = None;
        while let Ok(event) = events.try_recv() {
            if let TimerEvent::Stopped { interval, total, .. } = event {
                stopped = Some((interval, total));
                break;
            }
        }
        let (interval, total) = stopped.unwrap();
        assert_close(interval, Duration::from_secs(2));
        assert_close(total, Duration::from_secs(2));
        assert_eq!(
            events.try_recv(),
            Ok(TimerEvent::Started {
                name: "A".to_string()
            })
        );

        let timer = handle.get_timer("A").await.unwrap();
        assert!(timer.is_active());
        assert_close(timer.total, Duration::from_secs(2));
        assert_eq!(timer.current, Duration::ZERO);

        // Ticks realign with the new run
        let (name, elapsed, total) = next_tick(&mut events).await;
        assert_eq!(name, "A");
        assert_close(elapsed, Duration::from_secs(1));
        assert_close(total, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_stop_without_active_timer_is_noop() {
        let (handle, _task, _cancel) = spawn_service(&["A"]);
        let mut events = handle.subscribe().await.unwrap();

        assert_eq!(handle.stop_current_timer().await.unwrap(), None);
        assert_eq!(handle.active_timer().await.unwrap(), None);

        let timer = handle.get_timer("A").await.unwrap();
        assert_eq!(timer.state, TimerState::Idle);
        assert_eq!(timer.total, Duration::ZERO);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_activations_leave_one_active() {
        let names = ["A", "B", "C", "D", "E"];
        let (handle, _task, _cancel) = spawn_service(&names);

        let requests = (0..50).map(|i| {
            let handle = handle.clone();
            let name = names[i % names.len()];
            tokio::spawn(async move { handle.activate_timer(name).await })
        });
        for result in futures::future::join_all(requests).await {
            assert_ok!(result.unwrap());
        }

        let summary = handle.summary().await.unwrap();
        let running: Vec<&TimerSnapshot> =
            summary.timers.iter().filter(|t| t.is_active()).collect();
        assert_eq!(running.len(), 1);
        assert_eq!(
            handle.active_timer().await.unwrap().as_deref(),
            Some(running[0].name.as_str())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_timer() {
        let (handle, _task, _cancel) = spawn_service(&["A", "B"]);
        handle.activate_timer("A").await.unwrap();
        sleep(Duration::from_secs(2)).await;

        let removed = handle.remove_timer("A").await.unwrap();
        assert!(!removed.is_active());
        assert_close(removed.total, Duration::from_secs(2));

        assert_eq!(handle.active_timer().await.unwrap(), None);
        assert_eq!(handle.list_timers().await.unwrap(), vec!["B"]);

        let err = assert_err!(handle.remove_timer("A").await);
        assert_eq!(err, TrackerError::TimerNotFound("A".to_string()));
    }

    #[tokio::test]
    async fn test_shutdown_stops_active_timer() {
        let (handle, task, _cancel) = spawn_service(&["A"]);
        let mut events = handle.subscribe().await.unwrap();
        handle.activate_timer("A").await.unwrap();

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(matches!(events.recv().await, Some(TimerEvent::Started { .. })));
        assert!(matches!(events.recv().await, Some(TimerEvent::Stopped { .. })));
        assert_eq!(events.recv().await, None);

        let err = assert_err!(handle.list_timers().await);
        assert_eq!(err, TrackerError::ServiceClosed);
        assert!(handle.try_shutdown().is_err());
    }

    #[tokio::test]
    async fn test_cancellation_token() {
        let (handle, task, cancel_token) = spawn_service(&["A"]);
        handle.activate_timer("A").await.unwrap();

        cancel_token.cancel();
        task.await.unwrap();

        let err = assert_err!(handle.activate_timer("A").await);
        assert_eq!(err, TrackerError::ServiceClosed);
    }

    #[tokio::test]
    async fn test_stops_when_all_handles_dropped() {
        let (handle, task, _cancel) = spawn_service(&["A"]);
        let second = handle.clone();
        drop(handle);
        assert_eq!(second.name(), "test");
        drop(second);

        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_buffers_are_clamped() {
        let config = TrackerConfig::default()
            .with_command_buffer_size(usize::MAX)
            .with_event_buffer_size(usize::MAX);
        let (service, handle) = TimerService::new(config, CancellationToken::new()).unwrap();
        let task = tokio::spawn(service.run());

        handle.activate_timer("Task").await.unwrap();
        assert_eq!(handle.active_timer().await.unwrap(), Some("Task".to_string()));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_before_spawn() {
        let (service, handle) =
            TimerService::new(TrackerConfig::default(), CancellationToken::new()).unwrap();
        let mut events = service.subscribe();
        let task = tokio::spawn(service.run());

        handle.activate_timer("Meeting").await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.name(), "Meeting");

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
