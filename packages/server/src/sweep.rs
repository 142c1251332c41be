use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::state::AppState;

/// Periodically drop expired credential cache entries and rate-limit windows.
///
/// Expiry is already enforced on read; this only bounds memory held for
/// callers that never return.
pub fn spawn_sweep_task(state: &AppState, every: Duration) -> JoinHandle<()> {
    let cache = state.credential_cache.clone();
    let limiters = state.limiters.clone();
    let every = every.max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let credentials = cache.purge_expired();
            let windows: usize = limiters.all().iter().map(|l| l.purge_expired()).sum();
            if credentials > 0 || windows > 0 {
                info!(credentials, windows, "Swept expired entries");
            } else {
                debug!("Sweep found nothing to remove");
            }
        }
    })
}
