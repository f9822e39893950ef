//! Compiled module cache.
//!
//! # Responsibilities
//! - Load compiled artifacts from the output directory into an `AST`
//! - Reuse loaded modules across requests
//! - Evict stale copies when a new version is compiled
//!
//! # Design Decisions
//! - Keyed by artifact path, validated against the entry's version tag,
//!   so a process that only follows `routes.json` still reloads fresh bytes
//! - Loads happen lazily, on the first request that needs the module

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use rhai::{Engine, AST};
use thiserror::Error;

use crate::table::RouteEntry;

/// Errors loading a compiled module at request time.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read module {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot load module {path}: {message}")]
    Syntax { path: PathBuf, message: String },
}

/// A compiled module ready for invocation.
#[derive(Debug)]
pub struct LoadedModule {
    version: String,
    ast: AST,
    /// Script function name → parameter count.
    functions: HashMap<String, usize>,
}

impl LoadedModule {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn ast(&self) -> &AST {
        &self.ast
    }

    /// Parameter count of the named function, if the module defines it.
    pub fn arity(&self, name: &str) -> Option<usize> {
        self.functions.get(name).copied()
    }
}

/// Cache of loaded modules, shared by the store and the request path.
pub struct ModuleCache {
    engine: Engine,
    out_dir: PathBuf,
    modules: DashMap<String, Arc<LoadedModule>>,
}

impl ModuleCache {
    pub fn new(engine: Engine, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            out_dir: out_dir.into(),
            modules: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Load the module an entry points at, reusing a cached copy of the same version.
    ///
    /// Blocking: reads from disk on a cache miss.
    pub fn load(&self, entry: &RouteEntry) -> Result<Arc<LoadedModule>, LoadError> {
        let cached = self
            .modules
            .get(&entry.path)
            .filter(|module| module.version == entry.version)
            .map(|module| Arc::clone(module.value()));
        if let Some(module) = cached {
            return Ok(module);
        }

        let module = Arc::new(self.read_module(entry)?);
        self.modules.insert(entry.path.clone(), Arc::clone(&module));
        tracing::debug!(path = %entry.path, version = %entry.version, "Loaded module");
        Ok(module)
    }

    /// Evict any loaded copy of the module at `path`.
    pub fn invalidate(&self, path: &str) -> bool {
        self.modules.remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn read_module(&self, entry: &RouteEntry) -> Result<LoadedModule, LoadError> {
        let path = self.out_dir.join(&entry.path);
        let source = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        let ast = self.engine.compile(&source).map_err(|e| LoadError::Syntax {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let functions = ast
            .iter_functions()
            .map(|f| (f.name.to_string(), f.params.len()))
            .collect();

        Ok(LoadedModule {
            version: entry.version.clone(),
            ast,
            functions,
        })
    }
}
