//! Startup orchestration.
//!
//! # Responsibilities
//! - Prepare the output directory and module manifest
//! - Initialize all subsystems in dependency order
//! - Start background tasks (watch-compile loop, table sync)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Components are built here and passed down as explicit handles
//! - The watcher is attached before the initial scan so no edit is missed

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::compiler::{build_engine, Compiler, ModuleFormat, RhaiTransform};
use crate::config::{ConfigError, MinirestConfig, ProjectConfig};
use crate::dispatch::{HandlerRegistry, ModuleCache, TableSync, DEFAULT_HANDLER, GET_HANDLER};
use crate::http::HttpServer;
use crate::layout::{path_router, ProjectLayout};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::table::{RouteTableStore, TableError};
use crate::watch::{ScanReport, SourceWatcher, TableFileWatcher, WatchCompileLoop};

/// Fatal errors before or while serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot prepare source directory {path}: {source}")]
    SourceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("cannot render module manifest: {0}")]
    Manifest(#[source] serde_json::Error),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Marker written next to compiled modules.
#[derive(Debug, Serialize)]
struct ModuleManifest<'a> {
    format: String,
    handler: &'a str,
    get: &'a str,
}

/// Create (if needed) and canonicalize the project directories.
///
/// The source directory is only created when `with_sources` is set.
pub fn prepare_layout(config: &ProjectConfig, with_sources: bool) -> Result<ProjectLayout, StartupError> {
    let out_dir = config.out_path();
    std::fs::create_dir_all(&out_dir).map_err(|source| StartupError::OutputDir {
        path: out_dir.clone(),
        source,
    })?;
    let out_dir = out_dir.canonicalize().map_err(|source| StartupError::OutputDir {
        path: out_dir.clone(),
        source,
    })?;

    let src_dir = config.src_path();
    let src_dir = if with_sources {
        std::fs::create_dir_all(&src_dir)
            .and_then(|()| src_dir.canonicalize())
            .map_err(|source| StartupError::SourceDir {
                path: src_dir.clone(),
                source,
            })?
    } else {
        src_dir
    };

    Ok(ProjectLayout::new(src_dir, out_dir, path_router(config)))
}

/// Write `manifest.json` declaring how compiled modules are loaded.
pub fn write_manifest(layout: &ProjectLayout, format: ModuleFormat) -> Result<(), StartupError> {
    let manifest = ModuleManifest {
        format: format.to_string(),
        handler: DEFAULT_HANDLER,
        get: GET_HANDLER,
    };
    let path = layout.manifest_path();
    let text = serde_json::to_string_pretty(&manifest)
        .map_err(StartupError::Manifest)?;

    std::fs::write(&path, text).map_err(|source| StartupError::OutputDir { path, source })
}

/// Bind the HTTP listener.
pub async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Install the metrics exporter when enabled.
pub fn init_metrics(config: &MinirestConfig) {
    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse::<SocketAddr>() {
        Ok(addr) => metrics::init_metrics(addr),
        Err(_) => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}

struct Compilation {
    layout: Arc<ProjectLayout>,
    modules: Arc<ModuleCache>,
    store: Arc<RouteTableStore>,
    pipeline: WatchCompileLoop,
}

async fn compilation(config: &MinirestConfig) -> Result<Compilation, StartupError> {
    let layout = Arc::new(prepare_layout(&config.project, true)?);

    let compiler = Compiler::new(Arc::new(RhaiTransform::new(build_engine(&config.engine))));
    write_manifest(&layout, compiler.target())?;

    let modules = Arc::new(ModuleCache::new(build_engine(&config.engine), layout.out_dir()));
    let store = Arc::new(RouteTableStore::new(
        layout.router().clone(),
        layout.table_path(),
        Arc::clone(&modules),
    ));
    store.reset().await?;

    let pipeline = WatchCompileLoop::new(
        Arc::clone(&layout),
        compiler,
        Arc::clone(&store),
        config.project.clean_orphans,
    );

    Ok(Compilation {
        layout,
        modules,
        store,
        pipeline,
    })
}

/// Compile every source once and write `routes.json`.
pub async fn run_build(config: &MinirestConfig) -> Result<ScanReport, StartupError> {
    let compilation = compilation(config).await?;
    let report = compilation.pipeline.scan().await;

    tracing::info!(
        compiled = report.compiled,
        failed = report.failed,
        routes = compilation.store.snapshot().len(),
        table = %compilation.layout.table_path().display(),
        "Build finished"
    );
    Ok(report)
}

/// Watch, compile and serve in one process until shutdown.
pub async fn run_dev(
    config: &MinirestConfig,
    listener: TcpListener,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let sync_shutdown = shutdown.subscribe();
    let loop_shutdown = shutdown.subscribe();
    let server_shutdown = shutdown.subscribe();

    let Compilation {
        layout,
        modules,
        store,
        pipeline,
    } = compilation(config).await?;

    let registry = Arc::new(HandlerRegistry::new());
    let sync_task = tokio::spawn(
        TableSync::new(Arc::clone(&registry)).run(store.subscribe(), sync_shutdown),
    );

    let (watcher, events) = SourceWatcher::new(layout.src_dir(), layout.extension());
    let _watcher = watcher.run().map_err(|source| StartupError::Watch {
        path: layout.src_dir().to_path_buf(),
        source,
    })?;

    let report = pipeline.scan().await;
    tracing::info!(
        compiled = report.compiled,
        failed = report.failed,
        "Initial compile finished"
    );

    let loop_task = tokio::spawn(pipeline.run(events, loop_shutdown));

    let server = HttpServer::new(&config.server, registry, modules);
    let served = server.run(listener, server_shutdown).await;

    // Background tasks only stop on the signal
    shutdown.trigger();
    let _ = tokio::join!(sync_task, loop_task);
    served.map_err(StartupError::Serve)
}

/// Serve from an existing `routes.json`, following changes to it.
pub async fn run_serve(
    config: &MinirestConfig,
    listener: TcpListener,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let sync_shutdown = shutdown.subscribe();
    let server_shutdown = shutdown.subscribe();

    let layout = prepare_layout(&config.project, false)?;
    let table_path = layout.table_path();
    warn_if_missing(&table_path);

    let modules = Arc::new(ModuleCache::new(build_engine(&config.engine), layout.out_dir()));
    let registry = Arc::new(HandlerRegistry::new());

    let (watcher, snapshots) = TableFileWatcher::new(&table_path);
    let _watcher = watcher.run().map_err(|source| StartupError::Watch {
        path: table_path.clone(),
        source,
    })?;

    let sync_task = tokio::spawn(TableSync::new(Arc::clone(&registry)).run(snapshots, sync_shutdown));

    let server = HttpServer::new(&config.server, registry, modules);
    let served = server.run(listener, server_shutdown).await;

    shutdown.trigger();
    let _ = sync_task.await;
    served.map_err(StartupError::Serve)
}

fn warn_if_missing(table_path: &Path) {
    if !table_path.exists() {
        tracing::warn!(
            path = %table_path.display(),
            "No route table yet; run `minirest build` or `minirest dev`"
        );
    }
}
