use std::sync::Arc;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use domain::conntrack::CONN_ROLL_INTERVAL;

use crate::engine::Engine;

/// Background expiry sweep: every `CONN_ROLL_INTERVAL` the tracker drops
/// flows whose deadline has passed. The tracker's collect-then-erase
/// pattern keeps each write-guard hold brief, so the sweep never starves
/// the hook stages.
pub async fn run_sweeper(engine: Arc<Engine>, cancel: CancellationToken) {
    let mut ticker = time::interval(CONN_ROLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let removed = engine.tracker().sweep_expired();
                if removed > 0 {
                    debug!(removed, "expired flows swept");
                }
            }
        }
    }

    info!("sweeper stopped");
}
