//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Source path (relative to src/)
//!     → path.rs (map_path_to_route → RoutePattern or not-a-route)
//!
//! Route table snapshot
//!     → matcher.rs (compile each pattern into segments)
//!     → router.rs (sort by specificity, freeze as RouteSet)
//!
//! Incoming request path
//!     → RouteSet::match_path → matched route + params, or no match
//! ```
//!
//! # Design Decisions
//! - Patterns derive solely from file paths; no declared routes
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same table always yields the same lookup result

pub mod matcher;
pub mod path;
pub mod router;

pub use matcher::{Params, PatternMatcher};
pub use path::{map_path_to_route, relative_key, PathRouter, RoutePattern};
pub use router::{CompiledRoute, RouteMatch, RouteSet};
