//! Basic usage example for the time tracker
//!
//! Plays the part of a status-bar UI: prints a line for every event and
//! switches between activities.

use futures::StreamExt;
use time_tracker::{
    format_hms, CancellationToken, Duration, TimerEvent, TimerService, TrackerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let cancel_token = CancellationToken::new();

    // Create the service with the default activities
    let (service, handle) = TimerService::new(TrackerConfig::default(), cancel_token.clone())?;
    let events = service.subscribe();

    // Spawn the service task
    let service_task = tokio::spawn(service.run());

    // Render every event like a status bar would
    let ui_task = tokio::spawn(async move {
        let mut events = events.into_stream();
        while let Some(event) = events.next().await {
            match event {
                TimerEvent::Started { name } => println!("Tracking time for {}", name),
                TimerEvent::Tick { name, elapsed, total } => {
                    println!("{}\t{}\t(total {})", format_hms(elapsed), name, format_hms(total))
                }
                TimerEvent::Stopped { name, interval, total } => println!(
                    "{} stopped after {}, total {}",
                    name,
                    format_hms(interval),
                    format_hms(total)
                ),
            }
        }
    });

    println!("Timers: {}", handle.list_timers().await?.join(", "));

    handle.activate_timer("Meeting").await?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Switching stops the meeting first
    handle.activate_timer("Task").await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    handle.stop_current_timer().await?;

    let summary = handle.summary().await?;
    for timer in &summary.timers {
        println!("{}", timer);
    }
    println!("{}\ttotal", format_hms(summary.total));

    // Shutdown gracefully
    handle.shutdown().await?;
    service_task.await?;
    ui_task.await?;

    println!("Time tracker shut down successfully!");
    Ok(())
}
