//! File watching subsystem.
//!
//! # Data Flow
//! ```text
//! src/**/*.rhai changes
//!     → source.rs (notify watcher, extension filter)
//!     → events.rs (classify into ADD / CHANGE / UNLINK)
//!     → pipeline.rs (compile, update route table store)
//!
//! .minirest/routes.json changes (serve mode)
//!     → table_file.rs (re-read, parse, publish snapshot)
//! ```
//!
//! # Design Decisions
//! - Watcher callbacks only classify and forward; work happens on the runtime
//! - Existing files are picked up by an initial scan, not by the watcher

pub mod events;
pub mod pipeline;
pub mod source;
pub mod table_file;

pub use events::{classify, FileEvent, FileEventKind};
pub use pipeline::{PipelineError, ScanReport, WatchCompileLoop};
pub use source::SourceWatcher;
pub use table_file::TableFileWatcher;
