//! Source-to-module transforms.

use std::fmt;
use std::path::Path;

use rhai::Engine;

use crate::compiler::CompileError;

/// Module-loading convention of compiled output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    /// Rhai script, loaded into an `AST` by the module cache.
    Rhai,
}

impl ModuleFormat {
    /// File extension of compiled artifacts.
    pub fn extension(self) -> &'static str {
        match self {
            ModuleFormat::Rhai => "rhai",
        }
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleFormat::Rhai => f.write_str("rhai"),
        }
    }
}

/// Turns one source file's text into an executable module.
///
/// Whole-file, single module: no cross-file linking.
pub trait Transform: Send + Sync {
    /// Format of the produced module.
    fn target(&self) -> ModuleFormat;

    /// Transform `source`, read from `origin`.
    fn transform(&self, source: &str, origin: &Path) -> Result<String, CompileError>;
}

/// Validates a Rhai script and emits it in normalized form.
pub struct RhaiTransform {
    engine: Engine,
}

impl RhaiTransform {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

impl Default for RhaiTransform {
    fn default() -> Self {
        Self::new(Engine::new())
    }
}

impl Transform for RhaiTransform {
    fn target(&self) -> ModuleFormat {
        ModuleFormat::Rhai
    }

    fn transform(&self, source: &str, origin: &Path) -> Result<String, CompileError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let normalized = source.replace("\r\n", "\n");

        self.engine
            .compile(&normalized)
            .map_err(|e| CompileError::Syntax {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_script_is_normalized() {
        let transform = RhaiTransform::default();
        let out = transform
            .transform("\u{feff}fn handle(req) {\r\n  42\r\n}\r\n", Path::new("a.rhai"))
            .unwrap();
        assert_eq!(out, "fn handle(req) {\n  42\n}\n");
    }

    #[test]
    fn test_syntax_error_reports_origin() {
        let transform = RhaiTransform::default();
        let err = transform
            .transform("fn handle(req) { #{ msg: ", Path::new("routes/broken.rhai"))
            .unwrap_err();

        match err {
            CompileError::Syntax { path, message } => {
                assert_eq!(path, Path::new("routes/broken.rhai"));
                assert!(!message.is_empty());
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }
}
