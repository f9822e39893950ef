//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing + timeout layers)
//!     → registry lookup (RoutePattern match, params)
//!     → request.rs (buffer body, build ScriptRequest)
//!     → dispatch::resolve (blocking pool)
//!     → response.rs (HandlerOutput → HTTP response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
