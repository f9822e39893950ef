//! File-based dev router library.

pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod layout;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod table;
pub mod watch;

pub use config::schema::MinirestConfig;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, StartupError};
pub use routing::{PathRouter, RoutePattern};
pub use table::{RouteEntry, RouteTable};
