//! Server wiring.
//!
//! # Responsibilities
//! - Assemble the application state shared by request tasks
//! - Build the axum router (serve handler, optional live-reload endpoint)
//! - Wire middleware (HTTP tracing, request logging unless quiet)
//! - Run with graceful shutdown on ctrl-c

use std::sync::Arc;

use axum::middleware;
use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::files::ServedSet;
use crate::http::handler::serve;
use crate::http::logging::log_requests;
use crate::proxy::FallbackProxy;
use crate::watch::{livereload_handler, LiveReload, WatchRegistry};

/// Shared application state, injected into every handler.
///
/// The config is read-only after startup; the served set and watch registry
/// are the only cross-request mutable state, each behind its own lock.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub served: Arc<ServedSet>,
    pub watcher: Option<Arc<WatchRegistry>>,
    pub reload: Option<LiveReload>,
    pub fallback: Option<Arc<FallbackProxy>>,
}

/// The HTTP server for one served directory.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Build the server and its subsystems from a validated config.
    pub fn new(config: ServerConfig) -> Result<Self, StartupError> {
        let config = Arc::new(config);

        let fallback = config
            .fallback
            .as_ref()
            .map(|url| Arc::new(FallbackProxy::new(url)));

        let (watcher, reload) = if config.livereload {
            let reload = LiveReload::new();
            let registry = WatchRegistry::new(reload.clone())?;
            (Some(registry), Some(reload))
        } else {
            (None, None)
        };

        let state = AppState {
            config: config.clone(),
            served: Arc::new(ServedSet::new()),
            watcher,
            reload,
            fallback,
        };

        Ok(Self {
            router: build_router(&config, state),
        })
    }

    /// The assembled router; useful for driving the server in tests without
    /// binding a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept connections until shutdown.
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

/// Build the router with all routes and middleware layers.
pub fn build_router(config: &ServerConfig, state: AppState) -> Router {
    let mut router = Router::new();
    if config.livereload {
        router = router.route("/livereload", get(livereload_handler));
    }
    let mut router = router
        .route("/", any(serve))
        .route("/{*path}", any(serve))
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if !config.quiet {
        router = router.layer(middleware::from_fn(log_requests));
    }
    router
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
    tracing::info!("shutdown signal received");
}
