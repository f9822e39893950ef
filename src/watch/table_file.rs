//! Persisted route table follower, for serving from `routes.json` alone.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;

use crate::table::persist::{read_table, read_table_or_empty, TableError};
use crate::table::RouteTable;

/// A watcher that re-reads the route table file whenever it changes.
pub struct TableFileWatcher {
    path: PathBuf,
    update_tx: watch::Sender<Arc<RouteTable>>,
}

impl TableFileWatcher {
    /// Create a new TableFileWatcher, seeded with the file's current contents.
    ///
    /// Returns the watcher and a receiver for table snapshots.
    pub fn new(path: &Path) -> (Self, watch::Receiver<Arc<RouteTable>>) {
        let initial = read_table_or_empty(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Route table unreadable, starting empty");
            RouteTable::new()
        });
        let (update_tx, update_rx) = watch::channel(Arc::new(initial));

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file.
    ///
    /// The parent directory is watched because writers replace the file by rename.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name: OsString = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        let path = self.path.clone();
        let tx = self.update_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if relevant {
                        reload(&path, &tx);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Route table watcher started");
        Ok(watcher)
    }
}

/// Re-read the table; a bad read keeps the current snapshot.
fn reload(path: &Path, tx: &watch::Sender<Arc<RouteTable>>) {
    match read_table(path) {
        Ok(table) => {
            tx.send_if_modified(|current| {
                if **current == table {
                    return false;
                }
                *current = Arc::new(table);
                true
            });
        }
        Err(TableError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Route table missing, keeping current handlers");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to reload route table. Keeping current handlers.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{write_table, RouteEntry};
    use std::time::Duration;

    #[test]
    fn test_seeded_from_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        std::fs::write(
            &path,
            r#"{ "routes": { "/a": { "path": "routes/a.rhai", "version": "v1" } } }"#,
        )
        .unwrap();

        let (_watcher, rx) = TableFileWatcher::new(&path);
        assert_eq!(rx.borrow().len(), 1);
    }

    #[test]
    fn test_parse_error_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        let (tx, rx) = watch::channel(Arc::new(RouteTable::new()));

        std::fs::write(&path, r#"{ "routes": { "/a": "#).unwrap();
        reload(&path, &tx);
        assert!(!rx.has_changed().unwrap());

        std::fs::write(
            &path,
            r#"{ "routes": { "/a": { "path": "routes/a.rhai", "version": "v1" } } }"#,
        )
        .unwrap();
        reload(&path, &tx);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_follows_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().canonicalize().unwrap().join("routes.json");
        write_table(&path, &RouteTable::new()).await.unwrap();

        let (watcher, mut rx) = TableFileWatcher::new(&path);
        let _watcher = watcher.run().unwrap();

        let mut table = RouteTable::new();
        table.insert("/b".into(), RouteEntry::new("routes/b.rhai", "v1"));
        write_table(&path, &table).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("table change not observed")
            .unwrap();
        assert_eq!(**rx.borrow(), table);
    }
}
