//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, one `<EVENT> <path>` line per watch event)
//!     → metrics.rs (compile, table write and request counters)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event for machine parsing
//! - Metrics are cheap and recorded unconditionally

pub mod logging;
pub mod metrics;
