//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum wiring, shared state, graceful shutdown)
//!     → logging.rs (request log middleware, byte-counting body)
//!     → handler.rs (fixed-order request pipeline)
//!         → files::classify / stream / listing / archive
//!         → proxy::FallbackProxy
//!     → response to client
//! ```

pub mod handler;
pub mod logging;
pub mod server;

pub use server::{AppState, HttpServer};
