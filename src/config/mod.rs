//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! minirest.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CLI overrides (root, bind address)
//!     → MinirestConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults so the file itself is optional
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_or_default, ConfigError};
pub use schema::{EngineConfig, MinirestConfig, ObservabilityConfig, ProjectConfig, ServerConfig};
pub use validation::{validate_config, ValidationError};
