//! Route pattern matching.
//!
//! # Responsibilities
//! - Compile a `RoutePattern` into static and parameter segments
//! - Match a request path, capturing parameter values
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `:name` matches exactly one non-empty segment
//! - A trailing slash on the request path is ignored
//! - Captured values are percent-decoded; static segments compare raw
//! - No regex to guarantee O(n) matching

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

use crate::routing::path::RoutePattern;

/// Captured route parameters, by name.
pub type Params = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

/// A compiled matcher for one route pattern.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    segments: Vec<Segment>,
}

impl PatternMatcher {
    /// Compile a pattern. The empty pattern matches only `/`.
    pub fn new(pattern: &RoutePattern) -> Self {
        let segments = split_path(pattern.as_str())
            .map(|part| match part.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Static(part.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// Returns the captured parameters if `path` matches.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(expected) => {
                    if expected != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = percent_decode_str(part).decode_utf8_lossy();
                    params.insert(name.clone(), value.into_owned());
                }
            }
        }
        Some(params)
    }

    /// Number of static segments; more static segments = more specific.
    pub fn specificity(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Static(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Split on '/', dropping the leading slash and a single trailing slash.
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.split('/').filter(move |_| !trimmed.is_empty())
}
