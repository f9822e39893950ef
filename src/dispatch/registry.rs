//! Registered handler set.
//!
//! # Responsibilities
//! - Keep exactly one catch-all handler per route pattern
//! - Reconcile against each table snapshot (register, deregister, update)
//! - Serve lock-free lookups to in-flight requests
//!
//! # Design Decisions
//! - The whole `RouteSet` is rebuilt and swapped atomically per sync
//! - Unchanged entries keep their `Arc<RouteEntry>` across syncs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::observability::metrics;
use crate::routing::{CompiledRoute, RoutePattern, RouteSet};
use crate::table::{RouteEntry, RouteTable};

/// What a sync changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<RoutePattern>,
    pub removed: Vec<RoutePattern>,
    pub updated: Vec<RoutePattern>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Handlers currently visible to the HTTP server.
pub struct HandlerRegistry {
    routes: ArcSwap<RouteSet>,
    registered: Mutex<HashMap<RoutePattern, Arc<RouteEntry>>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            routes: ArcSwap::from_pointee(RouteSet::default()),
            registered: Mutex::new(HashMap::new()),
        }
    }

    /// Current route set.
    pub fn routes(&self) -> Arc<RouteSet> {
        self.routes.load_full()
    }

    /// Reconcile the registered handlers with `snapshot`.
    pub fn sync(&self, snapshot: &RouteTable) -> SyncReport {
        let mut registered = self
            .registered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut report = SyncReport::default();

        registered.retain(|pattern, _| {
            let keep = snapshot.get(pattern).is_some();
            if !keep {
                report.removed.push(pattern.clone());
            }
            keep
        });

        for (pattern, entry) in snapshot.iter() {
            match registered.get_mut(pattern) {
                Some(current) if **current == *entry => {}
                Some(current) => {
                    *current = Arc::new(entry.clone());
                    report.updated.push(pattern.clone());
                }
                None => {
                    registered.insert(pattern.clone(), Arc::new(entry.clone()));
                    report.added.push(pattern.clone());
                }
            }
        }

        let routes = registered
            .iter()
            .map(|(pattern, entry)| CompiledRoute::new(pattern.clone(), Arc::clone(entry)))
            .collect();
        self.routes.store(Arc::new(RouteSet::new(routes)));
        metrics::record_route_count(registered.len());

        report.removed.sort();
        report
    }
}
