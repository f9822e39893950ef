//! Table-sync task: applies each route table snapshot to the registry.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::dispatch::registry::HandlerRegistry;
use crate::table::RouteTable;

/// Follows a snapshot channel and reconciles the handler registry.
pub struct TableSync {
    registry: Arc<HandlerRegistry>,
}

impl TableSync {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Apply the current snapshot, then every change until shutdown or the sender drops.
    pub async fn run(
        self,
        mut snapshots: watch::Receiver<Arc<RouteTable>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let initial = Arc::clone(&snapshots.borrow_and_update());
        self.apply(&initial);

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Route table source closed");
                        break;
                    }
                    let snapshot = Arc::clone(&snapshots.borrow_and_update());
                    self.apply(&snapshot);
                }
                _ = shutdown.recv() => break,
            }
        }
    }

    fn apply(&self, snapshot: &RouteTable) {
        let report = self.registry.sync(snapshot);
        if report.is_empty() {
            return;
        }

        for pattern in &report.added {
            tracing::info!(route = %pattern, "Registered handler");
        }
        for pattern in &report.updated {
            tracing::debug!(route = %pattern, "Updated handler");
        }
        for pattern in &report.removed {
            tracing::info!(route = %pattern, "Removed handler");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RouteEntry;
    use std::time::Duration;

    #[tokio::test]
    async fn test_follows_snapshots_until_shutdown() {
        let registry = Arc::new(HandlerRegistry::new());
        let (tx, rx) = watch::channel(Arc::new(RouteTable::new()));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(TableSync::new(Arc::clone(&registry)).run(rx, shutdown_rx));

        let mut table = RouteTable::new();
        table.insert("/a".into(), RouteEntry::new("routes/a.rhai", "v1"));
        tx.send_replace(Arc::new(table));

        let mut registered = false;
        for _ in 0..50 {
            if registry.routes().len() == 1 {
                registered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(registered, "snapshot was not applied");

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
