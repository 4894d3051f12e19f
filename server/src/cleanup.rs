use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::state::AppState;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawns a background task that periodically removes memberless rooms
/// whose settled recompute never got to prune them.
pub fn spawn_cleanup_task(state: AppState) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = tokio::time::sleep(CLEANUP_INTERVAL) => {}
            }
            sweep_stale_rooms(&state).await;
        }
    });
}

async fn sweep_stale_rooms(state: &AppState) {
    let ttl = chrono::Duration::seconds(state.empty_room_ttl_secs as i64);
    let removed = state.registry.write().await.sweep_stale(Utc::now(), ttl);
    if removed > 0 {
        info!("Cleanup complete: removed {} stale rooms", removed);
    }
}
