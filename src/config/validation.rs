//! Semantic validation of command line options.
//!
//! Syntactic concerns live in clap; everything here is about whether the
//! options make sense against the filesystem and each other. Any failure is
//! fatal: the process must not bind a listener with a broken config.

use std::path::PathBuf;

use url::Url;

use crate::config::Options;
use crate::error::StartupError;

/// Validated, immutable server configuration.
///
/// Owned by the application state and shared read-only across request tasks.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root directory being served (verified to exist).
    pub root: PathBuf,
    /// Root `index.html`, set only when pushstate is enabled (verified to exist).
    pub pushstate_index: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    /// Parsed basic-auth credentials; enforcement is left to an outer wrapper.
    pub auth: Option<(String, String)>,
    pub livereload: bool,
    pub pushstate: bool,
    pub no_index: bool,
    pub no_slash: bool,
    pub no_list: bool,
    pub no_archive: bool,
    pub no_cache: bool,
    pub quiet: bool,
    pub timefmt: Option<String>,
    pub fallback: Option<Url>,
    pub dirs_first: bool,
    pub case_insensitive: bool,
    pub open: bool,
}

impl ServerConfig {
    /// Validate raw options into a usable configuration.
    pub fn from_options(opts: Options) -> Result<Self, StartupError> {
        let root = opts.directory;
        if !root.is_dir() {
            return Err(StartupError::MissingDirectory(root));
        }

        let pushstate_index = if opts.pushstate {
            let index = root.join("index.html");
            if !index.is_file() {
                return Err(StartupError::PushStateIndexMissing(index));
            }
            Some(index)
        } else {
            None
        };

        let fallback = match opts.fallback {
            Some(raw) => {
                let url = Url::parse(&raw)?;
                if !url.scheme().starts_with("http") {
                    return Err(StartupError::InvalidFallbackScheme(url.scheme().to_string()));
                }
                Some(url)
            }
            None => None,
        };

        let auth = match opts.auth {
            Some(raw) => match raw.split_once(':') {
                Some((user, pass)) => Some((user.to_string(), pass.to_string())),
                None => return Err(StartupError::MalformedAuth),
            },
            None => None,
        };

        Ok(Self {
            root,
            pushstate_index,
            host: opts.host,
            port: opts.port,
            auth,
            livereload: opts.livereload,
            pushstate: opts.pushstate,
            no_index: opts.no_index,
            no_slash: opts.no_slash,
            no_list: opts.no_list,
            no_archive: opts.no_archive,
            no_cache: opts.no_cache,
            quiet: opts.quiet,
            timefmt: opts.timefmt,
            fallback,
            dirs_first: opts.dirs_first,
            case_insensitive: opts.case_insensitive,
            open: opts.open,
        })
    }

    /// Address the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
