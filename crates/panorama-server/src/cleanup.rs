use std::time::Duration;

use panorama_core::GraphService;
use tracing::{info, warn};

/// Background task that removes image blobs no scene points at.
///
/// The sweep touches SQLite and the filesystem synchronously, so each pass
/// runs on the blocking pool.
pub async fn run_sweep_loop(graph: GraphService, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let pass = graph.clone();
        match tokio::task::spawn_blocking(move || pass.sweep_orphan_blobs()).await {
            Ok(Ok(removed)) => {
                if !removed.is_empty() {
                    info!("Sweep: removed {} orphan blobs", removed.len());
                }
            }
            Ok(Err(e)) => warn!("Sweep error: {}", e),
            Err(e) => warn!("Sweep task failed: {}", e),
        }
    }
}
