//! Table-sync dispatcher.
//!
//! # Data Flow
//! ```text
//! RouteTable snapshot (store channel or routes.json follower)
//!     → sync.rs (one task, applies snapshots in order)
//!     → registry.rs (diff against registered patterns, swap RouteSet)
//!
//! Request
//!     → registry RouteSet lookup (lock-free)
//!     → resolve.rs (module cache → handle / get / exports)
//!     → HandlerOutput
//! ```
//!
//! # Design Decisions
//! - One handler per pattern; no accumulation across syncs
//! - Resolution is lazy: modules load on first request, not on registration
//! - Handler failures are caught per request and never reach the server

pub mod modules;
pub mod registry;
pub mod resolve;
pub mod sync;

pub use modules::{LoadError, LoadedModule, ModuleCache};
pub use registry::{HandlerRegistry, SyncReport};
pub use resolve::{resolve, DispatchError, HandlerOutput, ScriptRequest, DEFAULT_HANDLER, GET_HANDLER};
pub use sync::TableSync;
