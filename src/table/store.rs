//! In-memory route table with persisted mirror.
//!
//! # Responsibilities
//! - Upsert/remove routes computed from source paths
//! - Detect two source files claiming one pattern
//! - Evict stale module copies before recording a new version
//! - Persist the full table and publish the snapshot after every mutation
//!
//! # Design Decisions
//! - Mutations serialize on one async lock held across the persist,
//!   so snapshots reach disk in mutation order
//! - First owner of a pattern keeps it; later claimants are rejected
//! - A failed persist still publishes the in-memory snapshot

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::dispatch::ModuleCache;
use crate::observability::metrics;
use crate::routing::{PathRouter, RoutePattern};
use crate::table::persist::{write_table, TableError};
use crate::table::{RouteEntry, RouteTable};

/// Outcome of a single store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteUpdate {
    /// The path is not a route, or nothing was registered for it.
    Ignored,
    /// A new pattern was added.
    Inserted(RoutePattern),
    /// An existing pattern got a new entry.
    Replaced(RoutePattern),
    /// The pattern was removed.
    Removed(RoutePattern),
    /// Another source file already owns the pattern.
    Conflict {
        pattern: RoutePattern,
        owner: String,
    },
}

struct StoreState {
    table: RouteTable,
    /// Pattern → relative source path that produced it.
    owners: HashMap<RoutePattern, String>,
}

/// Sole writer of the route table.
pub struct RouteTableStore {
    router: PathRouter,
    table_path: PathBuf,
    modules: Arc<ModuleCache>,
    state: Mutex<StoreState>,
    snapshots: watch::Sender<Arc<RouteTable>>,
}

impl RouteTableStore {
    /// Create an empty store persisting to `table_path`.
    pub fn new(router: PathRouter, table_path: impl Into<PathBuf>, modules: Arc<ModuleCache>) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(RouteTable::new()));
        Self {
            router,
            table_path: table_path.into(),
            modules,
            state: Mutex::new(StoreState {
                table: RouteTable::new(),
                owners: HashMap::new(),
            }),
            snapshots,
        }
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    pub fn router(&self) -> &PathRouter {
        &self.router
    }

    /// Receive a snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RouteTable>> {
        self.snapshots.subscribe()
    }

    /// Current table.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.snapshots.borrow().clone()
    }

    /// Persist the (empty) initial table, replacing any stale file.
    pub async fn reset(&self) -> Result<(), TableError> {
        let state = self.state.lock().await;
        self.commit(&state.table).await
    }

    /// Record a freshly compiled module for the source at `relative`.
    pub async fn add_route(
        &self,
        relative: &str,
        output: &str,
        version: &str,
    ) -> Result<RouteUpdate, TableError> {
        let Some(pattern) = self.router.map_path_to_route(relative) else {
            return Ok(RouteUpdate::Ignored);
        };

        let mut state = self.state.lock().await;

        if let Some(owner) = state.owners.get(&pattern) {
            if owner != relative {
                tracing::warn!(
                    pattern = %pattern,
                    owner = %owner,
                    rejected = %relative,
                    "Route pattern already claimed by another file"
                );
                return Ok(RouteUpdate::Conflict {
                    pattern,
                    owner: owner.clone(),
                });
            }
        }

        self.modules.invalidate(output);

        let previous = state
            .table
            .insert(pattern.clone(), RouteEntry::new(output, version));
        state.owners.insert(pattern.clone(), relative.to_string());

        self.commit(&state.table).await?;

        tracing::debug!(pattern = %pattern, path = %output, version = %version, "Route updated");
        Ok(match previous {
            Some(_) => RouteUpdate::Replaced(pattern),
            None => RouteUpdate::Inserted(pattern),
        })
    }

    /// Drop the route produced by the source at `relative`.
    pub async fn remove_route(&self, relative: &str) -> Result<RouteUpdate, TableError> {
        let Some(pattern) = self.router.map_path_to_route(relative) else {
            return Ok(RouteUpdate::Ignored);
        };

        let mut state = self.state.lock().await;

        // A rejected claimant going away leaves the owner's route alone
        if state.owners.get(&pattern).map(String::as_str) != Some(relative) {
            return Ok(RouteUpdate::Ignored);
        }

        state.owners.remove(&pattern);
        if let Some(entry) = state.table.remove(&pattern) {
            self.modules.invalidate(&entry.path);
        }

        self.commit(&state.table).await?;

        tracing::debug!(pattern = %pattern, "Route removed");
        Ok(RouteUpdate::Removed(pattern))
    }

    /// Relative paths of the sources owning a route at or below `dir`.
    pub async fn sources_under(&self, dir: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let mut sources: Vec<String> = state
            .owners
            .values()
            .filter(|source| is_under(source, dir))
            .cloned()
            .collect();
        sources.sort();
        sources
    }

    async fn commit(&self, table: &RouteTable) -> Result<(), TableError> {
        let snapshot = Arc::new(table.clone());

        let result = write_table(&self.table_path, &snapshot).await;
        metrics::record_table_write(result.is_ok());

        self.snapshots.send_replace(snapshot);
        result
    }
}

fn is_under(path: &str, dir: &str) -> bool {
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::persist::read_table;
    use rhai::Engine;

    fn store(dir: &Path) -> RouteTableStore {
        let modules = Arc::new(ModuleCache::new(Engine::new(), dir));
        RouteTableStore::new(PathRouter::default(), dir.join("routes.json"), modules)
    }

    #[tokio::test]
    async fn test_add_persists_full_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let update = store
            .add_route("routes/hello.rhai", "routes/hello.rhai", "v1")
            .await
            .unwrap();
        assert_eq!(update, RouteUpdate::Inserted("/hello".into()));

        store.add_route("routes/index.rhai", "routes/index.rhai", "v1").await.unwrap();

        let persisted = read_table(store.table_path()).unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted, *store.snapshot());
    }

    #[tokio::test]
    async fn test_non_route_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let update = store.add_route("lib/util.rhai", "lib/util.rhai", "v1").await.unwrap();
        assert_eq!(update, RouteUpdate::Ignored);
        assert!(!store.table_path().exists());
    }

    #[tokio::test]
    async fn test_recompile_replaces_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.add_route("routes/a.rhai", "routes/a.rhai", "v1").await.unwrap();
        let update = store.add_route("routes/a.rhai", "routes/a.rhai", "v2").await.unwrap();
        assert_eq!(update, RouteUpdate::Replaced("/a".into()));

        let entry = store.snapshot().get(&"/a".into()).cloned().unwrap();
        assert_eq!(entry.version, "v2");
    }

    #[tokio::test]
    async fn test_collision_keeps_first_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.add_route("routes/a.rhai", "routes/a.rhai", "v1").await.unwrap();
        let update = store
            .add_route("routes/a/index.rhai", "routes/a/index.rhai", "v2")
            .await
            .unwrap();
        assert_eq!(
            update,
            RouteUpdate::Conflict {
                pattern: "/a".into(),
                owner: "routes/a.rhai".into(),
            }
        );
        assert_eq!(store.snapshot().get(&"/a".into()).unwrap().path, "routes/a.rhai");

        // The rejected file disappearing must not drop the owner's route
        let update = store.remove_route("routes/a/index.rhai").await.unwrap();
        assert_eq!(update, RouteUpdate::Ignored);
        assert_eq!(store.snapshot().len(), 1);

        // Once released, the other file can claim it
        store.remove_route("routes/a.rhai").await.unwrap();
        let update = store
            .add_route("routes/a/index.rhai", "routes/a/index.rhai", "v3")
            .await
            .unwrap();
        assert_eq!(update, RouteUpdate::Inserted("/a".into()));
    }

    #[tokio::test]
    async fn test_sources_under_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        for source in ["routes/users/a.rhai", "routes/users/[id].rhai", "routes/usersx.rhai"] {
            store.add_route(source, source, "v1").await.unwrap();
        }

        assert_eq!(
            store.sources_under("routes/users").await,
            vec!["routes/users/[id].rhai".to_string(), "routes/users/a.rhai".to_string()]
        );
        assert!(store.sources_under("routes/none").await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_publishes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut rx = store.subscribe();

        store.add_route("routes/x.rhai", "routes/x.rhai", "v1").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        let update = store.remove_route("routes/x.rhai").await.unwrap();
        assert_eq!(update, RouteUpdate::Removed("/x".into()));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_empty());
        assert!(read_table(store.table_path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_evicts_cached_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("routes")).unwrap();
        std::fs::write(dir.path().join("routes/a.rhai"), "fn get() { 1 }").unwrap();

        let modules = Arc::new(ModuleCache::new(Engine::new(), dir.path()));
        let store = RouteTableStore::new(
            PathRouter::default(),
            dir.path().join("routes.json"),
            Arc::clone(&modules),
        );

        modules.load(&RouteEntry::new("routes/a.rhai", "v1")).unwrap();
        assert_eq!(modules.len(), 1);

        store.add_route("routes/a.rhai", "routes/a.rhai", "v2").await.unwrap();
        assert!(modules.is_empty());
    }
}
