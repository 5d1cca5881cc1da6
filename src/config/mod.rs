//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line flags
//!     → Options (clap derive)
//!     → validation.rs (semantic checks: root exists, pushstate index,
//!       fallback url scheme, auth shape)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc with every request task
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated; there is no reload path
//! - Validation failures are fatal before the listener binds
//! - Toggles are all negative flags (`--no-index`, `--no-list`, ...) so the
//!   default invocation serves everything, matching typical dev usage

pub mod validation;

use std::path::PathBuf;

use clap::Parser;

pub use validation::ServerConfig;

/// Command line options.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devserve",
    about = "Serves the files in [directory], defaulting to the current working directory"
)]
pub struct Options {
    /// Directory from which files will be served
    #[arg(default_value = ".")]
    pub directory: PathBuf,

    /// Host interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Listening port
    #[arg(long, short, default_value_t = 3000)]
    pub port: u16,

    /// Enable HTTP basic auth with the chosen credentials (must be in the form 'user:pass')
    #[arg(long)]
    pub auth: Option<String>,

    /// Enable live reload: a websocket endpoint which triggers a browser
    /// refresh after each change to an already-served file
    #[arg(long)]
    pub livereload: bool,

    /// Missing extensionless paths return the root index.html instead of 404,
    /// for sane usage of the HTML5 history API
    #[arg(long, short = 's')]
    pub pushstate: bool,

    /// Disable automatic loading of index.html for directories
    #[arg(long)]
    pub no_index: bool,

    /// Disable the trailing-slash redirect for directory paths
    #[arg(long)]
    pub no_slash: bool,

    /// Disable directory listing
    #[arg(long)]
    pub no_list: bool,

    /// Disable directory archiving (downloading directories by appending
    /// .zip, .tar or .tar.gz; archives are streamed without buffering)
    #[arg(long)]
    pub no_archive: bool,

    /// Disable caching entirely (reported file modified time is always now)
    #[arg(long)]
    pub no_cache: bool,

    /// Disable request logging
    #[arg(long, short)]
    pub quiet: bool,

    /// Timestamp format for log lines (strftime syntax)
    #[arg(long)]
    pub timefmt: Option<String>,

    /// Requests that would 404 are instead proxied to this origin
    /// (the Host header is swapped in)
    #[arg(long)]
    pub fallback: Option<String>,

    /// List directories before files in listings
    #[arg(long)]
    pub dirs_first: bool,

    /// Sort listing entries case-insensitively
    #[arg(long)]
    pub case_insensitive: bool,

    /// Open the listening address in the default browser after startup
    #[arg(long)]
    pub open: bool,
}
