//! Project layout: where sources live and where their artifacts go.

use std::path::{Path, PathBuf};

use crate::compiler::ModuleFormat;
use crate::config::ProjectConfig;
use crate::routing::{relative_key, PathRouter};

/// Name of the persisted route table inside the output directory.
pub const ROUTES_FILE: &str = "routes.json";

/// Name of the module manifest inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Resolved source and output directories plus naming conventions.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    src_dir: PathBuf,
    out_dir: PathBuf,
    router: PathRouter,
}

impl ProjectLayout {
    /// Directories are used as given; callers canonicalize them first
    /// so watcher paths strip cleanly.
    pub fn new(src_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>, router: PathRouter) -> Self {
        Self {
            src_dir: src_dir.into(),
            out_dir: out_dir.into(),
            router,
        }
    }

    /// Layout with the conventions from `config`, using its directories as given.
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(config.src_path(), config.out_path(), path_router(config))
    }

    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn router(&self) -> &PathRouter {
        &self.router
    }

    pub fn extension(&self) -> &str {
        self.router.extension()
    }

    pub fn table_path(&self) -> PathBuf {
        self.out_dir.join(ROUTES_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.out_dir.join(MANIFEST_FILE)
    }

    /// True for files carrying the source extension.
    pub fn is_source(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(self.extension())
    }

    /// '/'-separated path of `path` relative to the source root.
    pub fn relative_source(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.src_dir).ok()?;
        relative_key(relative).filter(|key| !key.is_empty())
    }

    /// Artifact path, relative to the output directory, for a relative source.
    pub fn output_relative(&self, relative: &str, format: ModuleFormat) -> String {
        let stem = relative
            .strip_suffix(self.extension())
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(relative);
        format!("{stem}.{}", format.extension())
    }

    /// Absolute artifact path for an output-relative path.
    pub fn output_path(&self, output_relative: &str) -> PathBuf {
        join_relative(&self.out_dir, output_relative)
    }

    /// Inverse of `output_relative`.
    pub fn source_relative(&self, output_relative: &str, format: ModuleFormat) -> String {
        let stem = output_relative
            .strip_suffix(format.extension())
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(output_relative);
        format!("{stem}.{}", self.extension())
    }

    /// Absolute source path for a relative source.
    pub fn source_path(&self, relative: &str) -> PathBuf {
        join_relative(&self.src_dir, relative)
    }
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .fold(base.to_path_buf(), |path, part| path.join(part))
}

/// Naming conventions from config.
pub fn path_router(config: &ProjectConfig) -> PathRouter {
    PathRouter::new(
        config.routes_dir.clone(),
        config.index_name.clone(),
        config.extension.clone(),
    )
}
