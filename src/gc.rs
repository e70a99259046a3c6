//! Periodic collection of idle forwarding entries.
//!
//! The collector is a tokio task that sweeps the table every
//! `gc_interval`. Each sweep takes the table lock once, so it never
//! interleaves with a forwarding operation. The interval only sets how
//! promptly stale entries are noticed; the idle timeout itself is part of
//! the table configuration. Idleness is judged on the runtime clock.

use log::{debug, info};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::vrb::Vrb;

/// Spawn the collector on the current tokio runtime.
///
/// The task runs until `cancel` is triggered and returns the total number
/// of entries it evicted.
pub fn spawn_collector(vrb: Vrb, interval: Duration, cancel: CancellationToken) -> JoinHandle<u64> {
    tokio::spawn(run_collector(vrb, interval, cancel))
}

/// Collector loop; see [`spawn_collector`].
pub async fn run_collector(vrb: Vrb, interval: Duration, cancel: CancellationToken) -> u64 {
    info!("vrb collector started (every {:?})", interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    let mut total = 0u64;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = vrb.gc_at(Instant::now().into_std());
                if evicted > 0 {
                    debug!("vrb collector evicted {} entries", evicted);
                }
                total += evicted as u64;
            }
        }
    }
    info!("vrb collector stopped ({} entries evicted)", total);
    total
}
