//! Source path to route pattern mapping.
//!
//! # Responsibilities
//! - Decide whether a source file is a route (first segment is the routes dir)
//! - Elide the index leaf, map `[name]` segments to `:name`
//!
//! # Design Decisions
//! - Pure and deterministic: the pattern depends only on the relative path
//! - Segment comparison, not string prefix (`routesfoo/x` is not a route)
//! - No slash normalization beyond the join

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// URL path template derived from a source file's location.
///
/// The root route is the empty pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutePattern(String);

impl RoutePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for RoutePattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

/// Naming conventions used to turn source paths into routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRouter {
    routes_dir: String,
    index_name: String,
    extension: String,
}

impl Default for PathRouter {
    fn default() -> Self {
        Self::new("routes", "index", "rhai")
    }
}

impl PathRouter {
    pub fn new(
        routes_dir: impl Into<String>,
        index_name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            routes_dir: routes_dir.into(),
            index_name: index_name.into(),
            extension: extension.into(),
        }
    }

    /// Source extension, without the dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Map a '/'-separated path, relative to the source root, to a route.
    ///
    /// Returns `None` when the path is not under the routes directory.
    pub fn map_path_to_route(&self, relative: &str) -> Option<RoutePattern> {
        let mut parts = relative.split('/');
        if parts.next() != Some(self.routes_dir.as_str()) {
            return None;
        }

        let mut parts: Vec<&str> = parts.collect();
        let leaf = parts.pop();

        let mut segments: Vec<String> = parts.into_iter().map(map_segment).collect();

        if let Some(leaf) = leaf {
            let stem = self.strip_extension(leaf);
            if !stem.is_empty() && stem != self.index_name {
                segments.push(map_segment(stem));
            }
        }

        let mut pattern = String::new();
        for segment in &segments {
            pattern.push('/');
            pattern.push_str(segment);
        }
        Some(RoutePattern(pattern))
    }

    fn strip_extension<'a>(&self, leaf: &'a str) -> &'a str {
        leaf.strip_suffix(self.extension.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(leaf)
    }
}

/// Map a path with the default conventions (`routes/`, `index`, `.rhai`).
pub fn map_path_to_route(relative: &str) -> Option<RoutePattern> {
    PathRouter::default().map_path_to_route(relative)
}

/// `[name]` → `:name`, anything else unchanged.
fn map_segment(part: &str) -> String {
    match part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
        Some(name) => format!(":{name}"),
        None => part.to_string(),
    }
}

/// Render a relative filesystem path with '/' separators.
///
/// Returns `None` for paths that escape their base (`..`) or are absolute.
pub fn relative_key(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}
