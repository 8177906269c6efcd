//! # Live Feed Smoke Run
//!
//! Starts the scheduler against the configured live source and prints every
//! snapshot it publishes for a while.
//!
//! Usage: `test_live_feed [config.json] [seconds]`

use lib_feed::loggers::setup_logging;
use lib_feed::{FeedConfig, FeedScheduler};
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(30);

    let log_path = setup_logging(&std::env::temp_dir().join("live_feed_logs"), "live_feed", "debug")?;
    log::info!("Logging to {}", log_path.display());

    let config = FeedConfig::load(config_path.as_deref())?;
    println!("[*] Polling {} for {}s...", config.source_url, seconds);

    let mut feed = FeedScheduler::from_config(config)?;
    let mut rx = feed.subscribe();
    feed.start()?;

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = rx.borrow_and_update().clone();
                println!("-----------------------------------------------");
                println!("[{}] shown={} flagged={}", snap.status_label(), snap.total_events_shown, snap.flagged_events_shown);
                if let Some(reason) = &snap.last_error {
                    println!(">>> {}", reason);
                }
                if let Some(event) = &snap.event {
                    println!("{}", serde_json::to_string_pretty(event.as_ref())?);
                }
            }
        }
    }

    feed.stop().await;
    println!("[*] Stopped: {}", feed.snapshot().status_label());
    Ok(())
}
