//! devserve: a local development HTTP server.
//!
//! Serves a directory tree as a website, with the conveniences front-end
//! development needs:
//!
//! ```text
//!                    ┌───────────────────────────────────────────┐
//!   request ────────▶│ http::handler  (fixed-order pipeline)     │
//!                    │   classify ──▶ fallback ──▶ archive ──▶   │
//!                    │   404 ──▶ slash ──▶ index ──▶ listing ──▶ │
//!                    │   file stream                             │
//!                    └──────┬────────────────────────┬───────────┘
//!                           │                        │
//!                    files::stream             proxy::FallbackProxy
//!                           │
//!                    watch::WatchRegistry ──▶ watch::LiveReload ──▶ browsers
//! ```
//!
//! - SPA pushstate fallback to the root `index.html`
//! - Content-negotiated directory listings (JSON, XML, HTML, plain text)
//! - Streamed `.zip` / `.tar` / `.tar.gz` downloads of any directory
//! - Live reload over WebSocket for every directory that served a file
//! - Single-origin fallback proxy for missing resources

pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod proxy;
pub mod watch;

pub use config::{Options, ServerConfig};
pub use error::StartupError;
pub use http::HttpServer;
