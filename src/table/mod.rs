//! Route table subsystem.
//!
//! # Data Flow
//! ```text
//! Watch-compile loop
//!     → store.rs (upsert/remove under a mutation lock)
//!     → persist.rs (full snapshot → routes.json via temp file + rename)
//!     → watch channel (Arc<RouteTable> snapshot)
//!     → dispatcher
//! ```
//!
//! # Design Decisions
//! - Last full snapshot wins: every mutation rewrites the whole file
//! - The store is the only writer; everything else observes snapshots
//! - Versions are minted per compile, never content-addressed

pub mod persist;
pub mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::RoutePattern;

pub use persist::{read_table, write_table, TableError};
pub use store::{RouteTableStore, RouteUpdate};

/// Compiled module reference for one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Compiled module path, relative to the output directory.
    pub path: String,

    /// Opaque tag, unique per successful compile.
    pub version: String,
}

impl RouteEntry {
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }
}

/// Mint a fresh version tag.
pub fn mint_version() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// The full mapping of route pattern to compiled module.
///
/// Serialized as `{ "routes": { "<pattern>": { "path", "version" } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub routes: BTreeMap<RoutePattern, RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pattern: &RoutePattern) -> Option<&RouteEntry> {
        self.routes.get(pattern)
    }

    pub fn insert(&mut self, pattern: RoutePattern, entry: RouteEntry) -> Option<RouteEntry> {
        self.routes.insert(pattern, entry)
    }

    pub fn remove(&mut self, pattern: &RoutePattern) -> Option<RouteEntry> {
        self.routes.remove(pattern)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoutePattern, &RouteEntry)> {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_distinct() {
        let a = mint_version();
        let b = mint_version();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn test_wire_format() {
        let mut table = RouteTable::new();
        table.insert("/a/:id".into(), RouteEntry::new("routes/a/[id]/index.rhai", "v1"));

        let json: serde_json::Value = serde_json::to_value(&table).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "routes": {
                    "/a/:id": { "path": "routes/a/[id]/index.rhai", "version": "v1" }
                }
            })
        );
    }
}
