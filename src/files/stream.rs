//! File streaming with conditional GET and byte ranges.
//!
//! # Responsibilities
//! - Re-stat and open the resolved file at serve time
//! - Report a fresh modification time on first contact (cache defeat) and the
//!   stable one afterwards, tracked per canonical path in [`ServedSet`]
//! - Honor `If-Modified-Since` (whole-second granularity) and single `Range`
//!   requests
//! - Register the file's parent directory with the live-reload watcher
//!
//! # Design Decisions
//! - The first serve of a file during the process lifetime reports "now" as
//!   its modification time, so browsers never show a stale copy on first
//!   contact; subsequent serves report the true mtime and conditional caching
//!   works normally. `--no-cache` forces "now" on every serve.
//! - Only the first range of a multi-range request is honored; multipart
//!   range responses are not worth their complexity for a dev server.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;

use crate::config::ServerConfig;
use crate::watch::WatchRegistry;

/// Files that have been served at least once this process lifetime.
///
/// Keys are canonicalized so equivalent paths share one entry. The set only
/// grows; it exists solely to decide between the fresh and the stable
/// modification time.
#[derive(Debug, Default)]
pub struct ServedSet {
    inner: Mutex<HashSet<PathBuf>>,
}

impl ServedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a serve. Returns true exactly once per path; the
    /// check-then-insert runs under the lock so concurrent first requests for
    /// the same file cannot both win.
    pub fn first_serve(&self, path: &Path) -> bool {
        self.inner.lock().unwrap().insert(path.to_path_buf())
    }
}

/// Stream a resolved file as an HTTP response.
pub async fn stream_file(
    config: &ServerConfig,
    served: &ServedSet,
    watcher: Option<&WatchRegistry>,
    method: &Method,
    headers: &HeaderMap,
    path: &Path,
) -> Response<Body> {
    // The target may have been deleted since classification.
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(_) => return plain_response(StatusCode::NOT_FOUND, "Not found"),
    };

    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to open file");
            return plain_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };

    // Every served file gets its parent directory watched for live reload.
    if config.livereload {
        if let (Some(watcher), Some(parent)) = (watcher, path.parent()) {
            watcher.watch(parent);
        }
    }

    let modtime = reported_modtime(config, served, path, &meta).await;
    let len = meta.len();

    if let Some(response) = not_modified(headers, modtime) {
        return response;
    }

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::LAST_MODIFIED, httpdate::fmt_http_date(modtime))
        .header(header::ACCEPT_RANGES, "bytes");

    // Range negotiation: a single satisfiable range gets 206, anything
    // unsatisfiable gets 416, no header gets the whole file.
    let (status, start, count) = match parse_range(headers, len) {
        RangeOutcome::Full => (StatusCode::OK, 0, len),
        RangeOutcome::Partial(start, end) => {
            builder = builder.header(
                header::CONTENT_RANGE,
                format!("bytes {start}-{end}/{len}"),
            );
            (StatusCode::PARTIAL_CONTENT, start, end - start + 1)
        }
        RangeOutcome::Unsatisfiable => {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{len}"))
                .body(Body::empty())
                .unwrap();
        }
    };
    builder = builder.status(status).header(header::CONTENT_LENGTH, count);

    if *method == Method::HEAD {
        return builder.body(Body::empty()).unwrap();
    }

    if start > 0 {
        if let Err(err) = file.seek(SeekFrom::Start(start)).await {
            return plain_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
    // The file handle is owned by the body stream and closed whenever the
    // stream ends, including on client disconnect.
    let body = Body::from_stream(ReaderStream::new(file.take(count)));
    builder.body(body).unwrap()
}

/// The modification time reported to the client, with first-serve cache defeat.
async fn reported_modtime(
    config: &ServerConfig,
    served: &ServedSet,
    path: &Path,
    meta: &std::fs::Metadata,
) -> SystemTime {
    let real = meta.modified().unwrap_or_else(|_| SystemTime::now());
    if config.no_cache {
        return SystemTime::now();
    }
    let canonical = tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf());
    if served.first_serve(&canonical) {
        SystemTime::now()
    } else {
        real
    }
}

fn not_modified(headers: &HeaderMap, modtime: SystemTime) -> Option<Response<Body>> {
    let since = headers
        .get(header::IF_MODIFIED_SINCE)?
        .to_str()
        .ok()
        .and_then(|value| httpdate::parse_http_date(value).ok())?;
    // HTTP dates carry whole seconds only.
    let modsecs = modtime.duration_since(UNIX_EPOCH).ok()?.as_secs();
    let sincesecs = since.duration_since(UNIX_EPOCH).ok()?.as_secs();
    if modsecs <= sincesecs {
        Some(
            Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::LAST_MODIFIED, httpdate::fmt_http_date(modtime))
                .body(Body::empty())
                .unwrap(),
        )
    } else {
        None
    }
}

enum RangeOutcome {
    Full,
    /// Inclusive byte offsets.
    Partial(u64, u64),
    Unsatisfiable,
}

fn parse_range(headers: &HeaderMap, len: u64) -> RangeOutcome {
    let raw = match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some(raw) => raw,
        None => return RangeOutcome::Full,
    };
    let parsed = match http_range_header::parse_range_header(raw) {
        Ok(parsed) => parsed,
        Err(_) => return RangeOutcome::Unsatisfiable,
    };
    match parsed.validate(len) {
        Ok(ranges) => match ranges.first() {
            Some(range) => RangeOutcome::Partial(*range.start(), *range.end()),
            None => RangeOutcome::Full,
        },
        Err(_) => RangeOutcome::Unsatisfiable,
    }
}

pub(crate) fn plain_response(status: StatusCode, message: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(message.to_string()))
        .unwrap()
}
