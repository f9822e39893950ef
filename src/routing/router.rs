//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes for one table snapshot
//! - Look up the route matching a request path
//! - Return matched route with captured params, or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (swapped whole, read without locks)
//! - Most static segments first, then lexical order: deterministic
//! - O(n) scan (acceptable for typical route counts)

use std::sync::Arc;

use crate::routing::matcher::{Params, PatternMatcher};
use crate::routing::path::RoutePattern;
use crate::table::RouteEntry;

/// One registered catch-all handler.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub pattern: RoutePattern,
    pub entry: Arc<RouteEntry>,
    matcher: PatternMatcher,
}

impl CompiledRoute {
    pub fn new(pattern: RoutePattern, entry: Arc<RouteEntry>) -> Self {
        let matcher = PatternMatcher::new(&pattern);
        Self {
            pattern,
            entry,
            matcher,
        }
    }
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a CompiledRoute,
    pub params: Params,
}

/// Immutable set of routes.
#[derive(Debug, Default)]
pub struct RouteSet {
    routes: Vec<CompiledRoute>,
}

impl RouteSet {
    pub fn new(mut routes: Vec<CompiledRoute>) -> Self {
        routes.sort_by(|a, b| {
            b.matcher
                .specificity()
                .cmp(&a.matcher.specificity())
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        Self { routes }
    }

    /// Find the route for a request path.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            route
                .matcher
                .matches(path)
                .map(|params| RouteMatch { route, params })
        })
    }

    pub fn get(&self, pattern: &RoutePattern) -> Option<&CompiledRoute> {
        self.routes.iter().find(|r| &r.pattern == pattern)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &RoutePattern> {
        self.routes.iter().map(|r| &r.pattern)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> RouteSet {
        RouteSet::new(
            patterns
                .iter()
                .map(|p| {
                    CompiledRoute::new(
                        RoutePattern::new(*p),
                        Arc::new(RouteEntry::new(format!("{p}.rhai"), "v1")),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_static_beats_param() {
        let routes = set(&["/users/:id", "/users/me"]);

        let m = routes.match_path("/users/me").unwrap();
        assert_eq!(m.route.pattern.as_str(), "/users/me");

        let m = routes.match_path("/users/7").unwrap();
        assert_eq!(m.route.pattern.as_str(), "/users/:id");
        assert_eq!(m.params["id"], "7");
    }

    #[test]
    fn test_root_and_no_match() {
        let routes = set(&["", "/hello"]);
        assert_eq!(routes.match_path("/").unwrap().route.pattern.as_str(), "");
        assert!(routes.match_path("/nope").is_none());
    }

    #[test]
    fn test_get_by_pattern() {
        let routes = set(&["/a", "/b"]);
        assert_eq!(routes.len(), 2);
        assert!(routes.get(&"/b".into()).is_some());
        assert!(routes.get(&"/c".into()).is_none());
    }
}
