//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dev server.
//! All types derive Serde traits for deserialization from `minirest.toml`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for minirest.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MinirestConfig {
    /// Source tree, output directory and file-naming conventions.
    pub project: ProjectConfig,

    /// Listener and request limits.
    pub server: ServerConfig,

    /// Script engine limits.
    pub engine: EngineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Project layout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project root; `src_dir` and `out_dir` are resolved against it.
    pub root: PathBuf,

    /// Watched source directory, relative to `root`.
    pub src_dir: PathBuf,

    /// Output directory for compiled modules and `routes.json`.
    pub out_dir: PathBuf,

    /// First path segment that marks a source file as a route.
    pub routes_dir: String,

    /// Leaf name that maps to its parent's pattern.
    pub index_name: String,

    /// Extension of handler sources (without the dot).
    pub extension: String,

    /// Delete compiled artifacts when their source is removed.
    pub clean_orphans: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            src_dir: PathBuf::from("src"),
            out_dir: PathBuf::from(".minirest"),
            routes_dir: "routes".to_string(),
            index_name: "index".to_string(),
            extension: "rhai".to_string(),
            clean_orphans: true,
        }
    }
}

impl ProjectConfig {
    /// Absolute-or-root-relative source directory.
    pub fn src_path(&self) -> PathBuf {
        self.root.join(&self.src_dir)
    }

    /// Absolute-or-root-relative output directory.
    pub fn out_path(&self) -> PathBuf {
        self.root.join(&self.out_dir)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:3123").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3123".to_string(),
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Limits applied to every handler invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum script operations per call (0 = unlimited).
    pub max_operations: u64,

    /// Maximum function call nesting.
    pub max_call_levels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 64,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9123".to_string(),
        }
    }
}
