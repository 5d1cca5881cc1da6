//! Startup errors.
//!
//! Everything here is fatal: these are reported once on stderr and the
//! process exits before the listener binds. Per-request failures are plain
//! HTTP status codes instead, produced inline by the pipeline.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("pushstate requires an index.html at the served root: {0}")]
    PushStateIndexMissing(PathBuf),

    #[error("invalid fallback url: {0}")]
    InvalidFallbackUrl(#[from] url::ParseError),

    #[error("fallback url scheme must be http or https, got {0}")]
    InvalidFallbackScheme(String),

    #[error("auth credentials must be in the form 'user:pass'")]
    MalformedAuth,

    #[error("failed to initialize file watcher: {0}")]
    Watcher(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
