//! Content-negotiated directory listings.
//!
//! # Responsibilities
//! - Enumerate a directory tolerantly (a failed per-entry stat keeps the
//!   entry, marked inaccessible, instead of failing the whole listing)
//! - Sort entries per config (case-insensitive, directories first)
//! - Render JSON, XML, HTML or plain text per the `Accept` header
//!
//! # Design Decisions
//! - Negotiation is first-match on the comma-separated `Accept` list with no
//!   q-value parsing; entries without a `/` are skipped. Deliberately simpler
//!   than RFC 9110 and asserted by tests as such.
//! - Field names serialize in PascalCase, the original wire format of this
//!   listing structure.

use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderMap, Response, StatusCode};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;

use crate::config::ServerConfig;
use crate::files::stream::plain_response;

/// Characters escaped inside href attributes.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'%');

/// One directory listing, built fresh per request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectoryListing {
    /// Path relative to the served root ("." for the root itself).
    pub path: String,
    /// Link to the parent directory, empty at the root.
    pub parent: String,
    pub num_files: usize,
    pub num_dirs: usize,
    pub total_size: u64,
    /// Whether archive downloads are offered for this directory.
    pub archive: bool,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileEntry {
    /// Absolute URL path of the entry.
    pub path: String,
    /// Entry name; directories carry a trailing slash.
    pub name: String,
    /// False when the per-entry stat failed.
    pub accessible: bool,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
}

/// Render a directory as an HTTP response.
pub async fn render(config: &ServerConfig, headers: &HeaderMap, dir: &Path) -> Response<Body> {
    let mut listing = match build_listing(config, dir).await {
        Ok(listing) => listing,
        Err(err) => {
            return plain_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Cannot list directory: {err}"),
            )
        }
    };
    sort_entries(
        &mut listing.files,
        config.case_insensitive,
        config.dirs_first,
    );

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let (format, content_type) = negotiate(accept);

    let body = match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&listing) {
            Ok(json) => json,
            Err(err) => {
                return plain_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
            }
        },
        ListingFormat::Xml => render_xml(&listing),
        ListingFormat::Html => render_html(&listing),
        ListingFormat::Plain => {
            let mut out = String::new();
            for file in &listing.files {
                out.push_str(&file.name);
                out.push('\n');
            }
            out
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

/// Enumerate `dir` into a listing. Names are read first; each entry is then
/// stat'ed best-effort so one unreadable entry cannot abort the listing.
pub async fn build_listing(
    config: &ServerConfig,
    dir: &Path,
) -> std::io::Result<DirectoryListing> {
    let rel = dir
        .strip_prefix(&config.root)
        .unwrap_or(Path::new(""))
        .to_string_lossy()
        .replace('\\', "/");
    let parent = if rel.is_empty() {
        String::new()
    } else {
        match rel.rsplit_once('/') {
            Some((head, _)) => format!("/{head}"),
            None => "/".to_string(),
        }
    };

    let mut listing = DirectoryListing {
        path: if rel.is_empty() { ".".to_string() } else { rel.clone() },
        parent,
        num_files: 0,
        num_dirs: 0,
        total_size: 0,
        archive: !config.no_archive,
        files: Vec::new(),
    };

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if name == ".DS_Store" {
            continue;
        }
        let url_path = if rel.is_empty() {
            format!("/{name}")
        } else {
            format!("/{rel}/{name}")
        };

        let mut file = FileEntry {
            path: url_path,
            name: String::new(),
            accessible: false,
            is_dir: false,
            size: 0,
            mtime: None,
        };
        // Follows symlinks, like the classifier does.
        if let Ok(meta) = tokio::fs::metadata(entry.path()).await {
            file.accessible = true;
            file.is_dir = meta.is_dir();
            if meta.is_dir() {
                name.push('/');
                listing.num_dirs += 1;
            } else {
                file.size = meta.len();
                listing.num_files += 1;
                listing.total_size += meta.len();
            }
            file.mtime = meta.modified().ok().map(DateTime::<Utc>::from);
        }
        file.name = name;
        listing.files.push(file);
    }

    Ok(listing)
}

/// Order entries by name, optionally case-insensitively; with `dirs_first`
/// the comparator keys on the directory flag before the name.
pub fn sort_entries(entries: &mut [FileEntry], case_insensitive: bool, dirs_first: bool) {
    entries.sort_by(|a, b| {
        let by_name = if case_insensitive {
            a.name.to_lowercase().cmp(&b.name.to_lowercase())
        } else {
            a.name.cmp(&b.name)
        };
        if dirs_first {
            b.is_dir.cmp(&a.is_dir).then(by_name)
        } else {
            by_name
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    Json,
    Xml,
    Html,
    Plain,
}

/// First-match content negotiation over the `Accept` header.
pub fn negotiate(accept: &str) -> (ListingFormat, String) {
    for entry in accept.split(',') {
        let Some((_, subtype)) = entry.split_once('/') else {
            continue;
        };
        let format = match subtype {
            "json" => ListingFormat::Json,
            "xml" => ListingFormat::Xml,
            "html" => ListingFormat::Html,
            _ => continue,
        };
        return (format, entry.trim().to_string());
    }
    (ListingFormat::Plain, "text/plain".to_string())
}

fn render_xml(listing: &DirectoryListing) -> String {
    let mut out = String::from("<DirectoryListing>\n");
    push_elem(&mut out, 1, "Path", &listing.path);
    push_elem(&mut out, 1, "Parent", &listing.parent);
    push_elem(&mut out, 1, "NumFiles", &listing.num_files.to_string());
    push_elem(&mut out, 1, "NumDirs", &listing.num_dirs.to_string());
    push_elem(&mut out, 1, "TotalSize", &listing.total_size.to_string());
    push_elem(&mut out, 1, "Archive", &listing.archive.to_string());
    out.push_str("  <Files>\n");
    for file in &listing.files {
        out.push_str("    <File>\n");
        push_elem(&mut out, 3, "Path", &file.path);
        push_elem(&mut out, 3, "Name", &file.name);
        push_elem(&mut out, 3, "Accessible", &file.accessible.to_string());
        push_elem(&mut out, 3, "IsDir", &file.is_dir.to_string());
        push_elem(&mut out, 3, "Size", &file.size.to_string());
        let mtime = file
            .mtime
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        push_elem(&mut out, 3, "Mtime", &mtime);
        out.push_str("    </File>\n");
    }
    out.push_str("  </Files>\n</DirectoryListing>\n");
    out
}

fn push_elem(out: &mut String, depth: usize, tag: &str, value: &str) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&escape(value));
    out.push_str("</");
    out.push_str(tag);
    out.push_str(">\n");
}

fn render_html(listing: &DirectoryListing) -> String {
    let mut out = String::from(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n",
    );
    out.push_str(&format!("<title>{}</title>\n", escape(&listing.path)));
    out.push_str(
        "<style>body{font-family:monospace}td{padding:0 1em}</style>\n</head>\n<body>\n",
    );
    out.push_str(&format!("<h1>{}</h1>\n", escape(&listing.path)));
    if !listing.parent.is_empty() {
        out.push_str(&format!(
            "<a href=\"{}\">..</a>\n",
            utf8_percent_encode(&listing.parent, HREF)
        ));
    }
    out.push_str("<table>\n<tr><th>Name</th><th>Size</th><th>Modified</th></tr>\n");
    for file in &listing.files {
        let size = if file.is_dir || !file.accessible {
            "-".to_string()
        } else {
            human_size(file.size)
        };
        let mtime = file
            .mtime
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>\n",
            utf8_percent_encode(&file.path, HREF),
            escape(&file.name),
            size,
            mtime,
        ));
    }
    out.push_str("</table>\n");
    out.push_str(&format!(
        "<p>{} files, {} dirs, {}</p>\n",
        listing.num_files,
        listing.num_dirs,
        human_size(listing.total_size)
    ));
    if listing.archive {
        let stem = if listing.path == "." {
            String::new()
        } else {
            listing.path.clone()
        };
        out.push_str("<p>download: ");
        for ext in [".zip", ".tar", ".tar.gz"] {
            out.push_str(&format!(
                "<a href=\"/{}{}\">{}</a> ",
                utf8_percent_encode(&stem, HREF),
                ext,
                ext
            ));
        }
        out.push_str("</p>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1}G", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}M", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}K", bytes as f64 / KB as f64)
    } else {
        format!("{bytes}B")
    }
}
