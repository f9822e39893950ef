//! Compiler subsystem.
//!
//! # Data Flow
//! ```text
//! source file (src/routes/**/*.rhai)
//!     → read full text
//!     → transform.rs (validate + normalize to the target module format)
//!     → ensure output directory
//!     → write artifact (.minirest/routes/**/*.rhai)
//! ```
//!
//! # Design Decisions
//! - Stateless per call; no cross-file incremental linking
//! - A failed compile never touches the previous artifact

pub mod engine;
pub mod transform;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub use engine::build_engine;
pub use transform::{ModuleFormat, RhaiTransform, Transform};

/// Errors surfaced by a single compile.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in {path}: {message}")]
    Syntax { path: PathBuf, message: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Compiles one source file to one module artifact.
#[derive(Clone)]
pub struct Compiler {
    transform: Arc<dyn Transform>,
}

impl Compiler {
    pub fn new(transform: Arc<dyn Transform>) -> Self {
        Self { transform }
    }

    /// Format of the artifacts this compiler produces.
    pub fn target(&self) -> ModuleFormat {
        self.transform.target()
    }

    /// Compile `source_path` into `output_path`.
    pub async fn compile(&self, source_path: &Path, output_path: &Path) -> Result<(), CompileError> {
        let source = tokio::fs::read_to_string(source_path)
            .await
            .map_err(|source| CompileError::Read {
                path: source_path.to_path_buf(),
                source,
            })?;

        let module = self.transform.transform(&source, source_path)?;

        if let Some(dir) = output_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| CompileError::Write {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(output_path, module)
            .await
            .map_err(|source| CompileError::Write {
                path: output_path.to_path_buf(),
                source,
            })?;

        tracing::debug!(
            source = %source_path.display(),
            output = %output_path.display(),
            format = %self.target(),
            "Compiled module"
        );
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Arc::new(RhaiTransform::default()))
    }
}
