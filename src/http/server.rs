//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all dispatch handler
//! - Wire up middleware (tracing, timeout)
//! - Bind server to listener
//! - Dispatch requests to the handler registered for the matched pattern

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::dispatch::{resolve, HandlerOutput, HandlerRegistry, ModuleCache};
use crate::http::request::script_request;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<HandlerRegistry>,
    pub modules: Arc<ModuleCache>,
    pub max_body_size: usize,
}

/// HTTP server for the dev router.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server dispatching through `registry`.
    pub fn new(config: &ServerConfig, registry: Arc<HandlerRegistry>, modules: Arc<ModuleCache>) -> Self {
        let state = AppState {
            registry,
            modules,
            max_body_size: config.max_body_size,
        };

        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Listening on {}", addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every method, every registered pattern.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let routes = state.registry.routes();
    let (pattern, entry, params) = match routes.match_path(&path) {
        Some(m) => (m.route.pattern.clone(), Arc::clone(&m.route.entry), m.params),
        None => {
            tracing::debug!(method = %method, path = %path, "No route matched");
            metrics::record_request(method.as_str(), 404, start);
            return (StatusCode::NOT_FOUND, format!("Cannot {method} {path}")).into_response();
        }
    };

    tracing::debug!(
        method = %method,
        path = %path,
        route = %pattern,
        module = %entry.path,
        version = %entry.version,
        "Dispatching request"
    );

    let script = match script_request(request, params, state.max_body_size).await {
        Ok(script) => script,
        Err(rejection) => {
            metrics::record_request(method.as_str(), rejection.status().as_u16(), start);
            return rejection;
        }
    };

    let modules = Arc::clone(&state.modules);
    let output = tokio::task::spawn_blocking(move || resolve(&modules, &entry, &script))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(route = %pattern, error = %e, "Handler task failed");
            HandlerOutput::failure(e.to_string())
        });

    let response = output.into_response();
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
