//! Watch-compile loop.
//!
//! # State Machine (per file, implicit)
//! ```text
//! ADD / CHANGE → compile → ok:  add_route(fresh version)
//!                        → err: log, previous entry stays
//! UNLINK       → remove_route → delete artifact (clean_orphans)
//!
//! directory ADD    → ADD for every source below it
//! directory UNLINK → UNLINK for every tracked source below it
//! ```
//!
//! # Design Decisions
//! - Events are handled one at a time in arrival order, no debouncing
//! - Errors are logged and never end the loop

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use walkdir::WalkDir;

use crate::compiler::{CompileError, Compiler};
use crate::layout::ProjectLayout;
use crate::observability::metrics;
use crate::routing::relative_key;
use crate::table::{mint_version, RouteTableStore, RouteUpdate, TableError};
use crate::watch::events::{FileEvent, FileEventKind};

/// Errors handling one file event.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0} is outside the source directory")]
    OutsideSource(PathBuf),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result of an initial scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub compiled: usize,
    pub failed: usize,
}

/// Turns file events into compiled artifacts and route table updates.
pub struct WatchCompileLoop {
    layout: Arc<ProjectLayout>,
    compiler: Compiler,
    store: Arc<RouteTableStore>,
    clean_orphans: bool,
}

impl WatchCompileLoop {
    pub fn new(
        layout: Arc<ProjectLayout>,
        compiler: Compiler,
        store: Arc<RouteTableStore>,
        clean_orphans: bool,
    ) -> Self {
        Self {
            layout,
            compiler,
            store,
            clean_orphans,
        }
    }

    /// Treat every existing source file as added.
    pub async fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();

        for path in files_in(self.layout.src_dir(), self.layout.extension()) {
            match self.handle(&FileEvent::new(FileEventKind::Add, path)).await {
                Ok(_) => report.compiled += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Initial compile failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Turn an event into per-source events.
    ///
    /// Watchers report a moved or deleted directory as one event for the
    /// directory itself, so it is fanned out to the sources below it.
    pub async fn expand(&self, event: &FileEvent) -> Vec<FileEvent> {
        if self.layout.is_source(&event.path) {
            return vec![event.clone()];
        }

        let paths = match event.kind {
            FileEventKind::Add if event.path.is_dir() => {
                files_in(&event.path, self.layout.extension())
            }
            FileEventKind::Unlink => self.tracked_under(&event.path).await,
            _ => Vec::new(),
        };
        paths
            .into_iter()
            .map(|path| FileEvent::new(event.kind, path))
            .collect()
    }

    /// Sources below a removed directory: route owners plus compiled artifacts.
    async fn tracked_under(&self, dir: &Path) -> Vec<PathBuf> {
        let Some(relative) = self.layout.relative_source(dir) else {
            return Vec::new();
        };

        let mut sources: BTreeSet<String> =
            self.store.sources_under(&relative).await.into_iter().collect();

        let target = self.compiler.target();
        let artifacts = self.layout.output_path(&relative);
        if artifacts.is_dir() {
            sources.extend(
                files_in(&artifacts, target.extension())
                    .iter()
                    .filter_map(|artifact| artifact.strip_prefix(self.layout.out_dir()).ok())
                    .filter_map(relative_key)
                    .map(|output| self.layout.source_relative(&output, target)),
            );
        }

        sources
            .into_iter()
            .map(|source| self.layout.source_path(&source))
            .collect()
    }

    /// Handle one event.
    pub async fn handle(&self, event: &FileEvent) -> Result<RouteUpdate, PipelineError> {
        tracing::info!("{} {}", event.kind, event.path.display());

        let relative = self
            .layout
            .relative_source(&event.path)
            .ok_or_else(|| PipelineError::OutsideSource(event.path.clone()))?;
        let output = self.layout.output_relative(&relative, self.compiler.target());

        match event.kind {
            FileEventKind::Add | FileEventKind::Change => {
                let output_path = self.layout.output_path(&output);
                let compiled = self.compiler.compile(&event.path, &output_path).await;
                metrics::record_compile(compiled.is_ok());
                compiled?;

                let update = self
                    .store
                    .add_route(&relative, &output, &mint_version())
                    .await?;
                Ok(update)
            }
            FileEventKind::Unlink => {
                let update = self.store.remove_route(&relative).await?;
                if self.clean_orphans {
                    self.remove_artifact(&output).await;
                }
                Ok(update)
            }
        }
    }

    /// Consume events until shutdown or the watcher goes away.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<FileEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("Source watcher closed");
                        break;
                    };
                    for event in self.expand(&event).await {
                        if let Err(e) = self.handle(&event).await {
                            tracing::error!(path = %event.path.display(), error = %e, "Failed to process file event");
                        }
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    }

    async fn remove_artifact(&self, output: &str) {
        let path = self.layout.output_path(output);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed orphaned module"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "Could not remove orphaned module"),
        }
    }
}

/// Files below `dir` with `extension`, in file-name order.
fn files_in(dir: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable source entry");
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some(extension)
        })
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ModuleCache;
    use crate::routing::{PathRouter, RoutePattern};
    use rhai::Engine;
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        src: PathBuf,
        pipeline: WatchCompileLoop,
        store: Arc<RouteTableStore>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let src = root.join("src");
        let out = root.join(".minirest");
        std::fs::create_dir_all(src.join("routes")).unwrap();
        std::fs::create_dir_all(&out).unwrap();

        let layout = Arc::new(ProjectLayout::new(&src, &out, PathRouter::default()));
        let modules = Arc::new(ModuleCache::new(Engine::new(), &out));
        let store = Arc::new(RouteTableStore::new(
            PathRouter::default(),
            layout.table_path(),
            modules,
        ));
        let pipeline = WatchCompileLoop::new(layout, Compiler::default(), Arc::clone(&store), true);

        Fixture {
            _dir: dir,
            src,
            pipeline,
            store,
        }
    }

    fn write(path: &Path, source: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, source).unwrap();
    }

    #[tokio::test]
    async fn test_add_compiles_and_registers() {
        let fx = fixture();
        let file = fx.src.join("routes/a/[id]/index.rhai");
        write(&file, "fn get(req) { req.params.id }");

        let update = fx
            .pipeline
            .handle(&FileEvent::new(FileEventKind::Add, &file))
            .await
            .unwrap();
        assert_eq!(update, RouteUpdate::Inserted("/a/:id".into()));

        let entry = fx.store.snapshot().get(&"/a/:id".into()).cloned().unwrap();
        assert_eq!(entry.path, "routes/a/[id]/index.rhai");
        assert!(fx.pipeline.layout.output_path(&entry.path).exists());
    }

    #[tokio::test]
    async fn test_each_change_mints_new_version() {
        let fx = fixture();
        let file = fx.src.join("routes/a.rhai");
        write(&file, "fn handle() { 1 }");

        let event = FileEvent::new(FileEventKind::Change, &file);
        fx.pipeline.handle(&event).await.unwrap();
        let first = fx.store.snapshot().get(&"/a".into()).unwrap().version.clone();
        fx.pipeline.handle(&event).await.unwrap();
        let second = fx.store.snapshot().get(&"/a".into()).unwrap().version.clone();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_syntax_error_keeps_previous_entry() {
        let fx = fixture();
        let file = fx.src.join("routes/a.rhai");
        write(&file, "fn handle() { 1 }");
        fx.pipeline.handle(&FileEvent::new(FileEventKind::Add, &file)).await.unwrap();
        let before = fx.store.snapshot();

        write(&file, "fn handle() { 1 ");
        let err = fx
            .pipeline
            .handle(&FileEvent::new(FileEventKind::Change, &file))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Compile(CompileError::Syntax { .. })));
        assert_eq!(fx.store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_unlink_removes_route_and_artifact() {
        let fx = fixture();
        let file = fx.src.join("routes/gone.rhai");
        write(&file, "fn handle() { 1 }");
        fx.pipeline.handle(&FileEvent::new(FileEventKind::Add, &file)).await.unwrap();
        let artifact = fx.pipeline.layout.output_path("routes/gone.rhai");
        assert!(artifact.exists());

        std::fs::remove_file(&file).unwrap();
        let update = fx
            .pipeline
            .handle(&FileEvent::new(FileEventKind::Unlink, &file))
            .await
            .unwrap();

        assert_eq!(update, RouteUpdate::Removed(RoutePattern::new("/gone")));
        assert!(fx.store.snapshot().is_empty());
        assert!(!artifact.exists());
    }

    #[tokio::test]
    async fn test_non_route_sources_compile_without_route() {
        let fx = fixture();
        let file = fx.src.join("lib/util.rhai");
        write(&file, "fn helper() { 1 }");

        let update = fx
            .pipeline
            .handle(&FileEvent::new(FileEventKind::Add, &file))
            .await
            .unwrap();
        assert_eq!(update, RouteUpdate::Ignored);
        assert!(fx.pipeline.layout.output_path("lib/util.rhai").exists());
    }

    #[tokio::test]
    async fn test_scan_picks_up_existing_files() {
        let fx = fixture();
        write(&fx.src.join("routes/index.rhai"), "fn handle() { \"home\" }");
        write(&fx.src.join("routes/users/[id].rhai"), "fn get(req) { req.params.id }");
        write(&fx.src.join("routes/broken.rhai"), "fn get( {");
        write(&fx.src.join("routes/readme.md"), "not a source");

        let report = fx.pipeline.scan().await;
        assert_eq!(report, ScanReport { compiled: 2, failed: 1 });

        let patterns: Vec<String> = fx
            .store
            .snapshot()
            .iter()
            .map(|(p, _)| p.as_str().to_string())
            .collect();
        assert_eq!(patterns, vec!["".to_string(), "/users/:id".to_string()]);
    }

    #[tokio::test]
    async fn test_moved_directory_fans_out() {
        let fx = fixture();
        write(&fx.src.join("routes/users/a.rhai"), "fn handle() { \"a\" }");
        write(&fx.src.join("routes/users/[id].rhai"), "fn handle(req) { req.params.id }");
        fx.pipeline.scan().await;

        let old = fx.src.join("routes/users");
        let new = fx.src.join("routes/people");
        std::fs::rename(&old, &new).unwrap();

        let unlinks = fx.pipeline.expand(&FileEvent::new(FileEventKind::Unlink, &old)).await;
        assert_eq!(
            unlinks,
            vec![
                FileEvent::new(FileEventKind::Unlink, old.join("[id].rhai")),
                FileEvent::new(FileEventKind::Unlink, old.join("a.rhai")),
            ]
        );
        let adds = fx.pipeline.expand(&FileEvent::new(FileEventKind::Add, &new)).await;
        assert_eq!(adds.len(), 2);

        for event in unlinks.iter().chain(&adds) {
            fx.pipeline.handle(event).await.unwrap();
        }

        let patterns: Vec<String> = fx
            .store
            .snapshot()
            .iter()
            .map(|(p, _)| p.as_str().to_string())
            .collect();
        assert_eq!(patterns, vec!["/people/:id".to_string(), "/people/a".to_string()]);
        assert!(!fx.pipeline.layout.output_path("routes/users/a.rhai").exists());
    }

    #[tokio::test]
    async fn test_unknown_directory_expands_to_nothing() {
        let fx = fixture();
        let gone = fx.src.join("routes/never-existed");
        assert!(fx.pipeline.expand(&FileEvent::new(FileEventKind::Unlink, &gone)).await.is_empty());
        let stray = fx.src.join("routes/notes.txt");
        assert!(fx.pipeline.expand(&FileEvent::new(FileEventKind::Change, &stray)).await.is_empty());
    }

    #[tokio::test]
    async fn test_event_outside_source_is_rejected() {
        let fx = fixture();
        let err = fx
            .pipeline
            .handle(&FileEvent::new(FileEventKind::Add, "/elsewhere/x.rhai"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::OutsideSource(_)));
    }
}
