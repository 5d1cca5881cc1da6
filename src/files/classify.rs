//! Path classification.
//!
//! # Responsibilities
//! - Decode and sanitize the request path (no traversal outside the root)
//! - Stat the joined path and classify it as File, Directory or Missing
//! - Apply the pushstate substitution for missing extensionless paths
//!
//! # Design Decisions
//! - Sanitization is component-based: `..`, root and prefix components are
//!   rejected outright instead of canonicalized, so a crafted path can never
//!   escape the served root
//! - Index substitution for directories is a separate step; the pipeline
//!   applies it only after the fallback and slash-redirect branches, matching
//!   the fixed decision order

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::config::ServerConfig;

/// What a request path resolved to on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
    Missing,
}

/// A classified request target. Produced once per request and consumed by the
/// pipeline branch that handles it.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub path: PathBuf,
    pub kind: TargetKind,
}

impl ResolvedTarget {
    pub fn is_dir(&self) -> bool {
        self.kind == TargetKind::Directory
    }

    pub fn is_missing(&self) -> bool {
        self.kind == TargetKind::Missing
    }
}

/// Decode the URL path and join it under `root`.
///
/// Returns `None` for paths that are not valid UTF-8 after percent-decoding
/// or that contain traversal components.
pub fn sanitize_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(request_path.trim_start_matches('/'))
        .decode_utf8()
        .ok()?;

    let mut joined = root.to_path_buf();
    for component in Path::new(decoded.as_ref()).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            // Traversal and absolute components never escape the root.
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(joined)
}

/// Whether the final path component carries an extension. Dotfiles like
/// `.hidden` count, so pushstate never substitutes them.
fn has_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains('.'))
}

/// Classify a request path against the filesystem.
///
/// When pushstate is enabled, a missing extensionless path resolves to the
/// root `index.html` (verified to exist at startup) instead of Missing.
pub async fn classify(config: &ServerConfig, request_path: &str) -> ResolvedTarget {
    let path = match sanitize_path(&config.root, request_path) {
        Some(p) => p,
        None => {
            return ResolvedTarget {
                path: config.root.clone(),
                kind: TargetKind::Missing,
            }
        }
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => ResolvedTarget {
            path,
            kind: TargetKind::Directory,
        },
        Ok(_) => ResolvedTarget {
            path,
            kind: TargetKind::File,
        },
        Err(_) => {
            if config.pushstate && !has_extension(&path) {
                if let Some(index) = &config.pushstate_index {
                    return ResolvedTarget {
                        path: index.clone(),
                        kind: TargetKind::File,
                    };
                }
            }
            ResolvedTarget {
                path,
                kind: TargetKind::Missing,
            }
        }
    }
}

/// Substitute `<dir>/index.html` for a directory target when present.
///
/// The substitution is re-verified against the filesystem; a vanished index
/// leaves the directory target untouched.
pub async fn apply_index(target: ResolvedTarget) -> ResolvedTarget {
    debug_assert!(target.is_dir());
    let index = target.path.join("index.html");
    match tokio::fs::metadata(&index).await {
        Ok(meta) if meta.is_file() => ResolvedTarget {
            path: index,
            kind: TargetKind::File,
        },
        _ => target,
    }
}
