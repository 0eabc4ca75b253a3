//! Background sweep that rolls back expired held transactions (spec §4.2).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::manager::Manager;

/// Runs until `shutdown` is cancelled by [`Manager::stop_reaper`]. Each tick
/// performs one sweep; a slow or failing sweep never blocks the next tick
/// indefinitely longer than `reaper_interval`, since `reap_expired` itself
/// removes entries it could not cleanly roll back.
pub(crate) async fn run(manager: Arc<Manager>, shutdown: CancellationToken) {
    let interval = Duration::from_secs(u64::from(manager.config().reaper_interval_secs.max(1)));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::debug!("reaper stopping");
                return;
            }
            _ = ticker.tick() => manager.reap_expired().await,
        }
    }
}
