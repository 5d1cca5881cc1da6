//! On-the-fly directory archives.
//!
//! # Responsibilities
//! - Detect archive suffixes (`.tar.gz` before `.tar` before `.zip`) on
//!   otherwise-missing paths and map them to an existing directory
//! - Stream a freshly built archive of that directory without buffering the
//!   whole archive in memory
//!
//! # Design Decisions
//! - The archive writer feeds one end of a `tokio::io::duplex` pipe; the
//!   response body streams the other end. Tar generation is synchronous
//!   (`tar` + `flate2`) and isolated in `spawn_blocking` behind a
//!   `SyncIoBridge`; zip generation is async (`async_zip`) and copies each
//!   file through in fixed-size chunks.
//! - A failure mid-stream appends a visible `ERROR:` marker to the bytes
//!   already flushed. Status and headers are long gone at that point; a
//!   partial archive is acceptable, silent truncation is not.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression as ZipCompression, ZipEntryBuilder};
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::io::AsyncWriteExt as _;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::io::{ReaderStream, SyncIoBridge};

const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    /// Match a supported archive suffix; the longest suffix wins, so
    /// `.tar.gz` is checked before `.tar`. Returns the format and the path
    /// with the suffix stripped.
    pub fn detect(path: &str) -> Option<(ArchiveFormat, &str)> {
        for (format, ext) in [
            (ArchiveFormat::TarGz, ".tar.gz"),
            (ArchiveFormat::Tar, ".tar"),
            (ArchiveFormat::Zip, ".zip"),
        ] {
            if let Some(stripped) = path.strip_suffix(ext) {
                return Some((format, stripped));
            }
        }
        None
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => ".zip",
            ArchiveFormat::Tar => ".tar",
            ArchiveFormat::TarGz => ".tar.gz",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
            ArchiveFormat::Tar => "application/x-tar",
            ArchiveFormat::TarGz => "application/gzip",
        }
    }
}

/// Attempt to serve a missing path as a directory archive. `None` means the
/// path carries no archive suffix or the stripped path is not a directory.
pub async fn try_archive(missing: &Path) -> Option<Response<Body>> {
    let path_str = missing.to_str()?;
    let (format, stripped) = ArchiveFormat::detect(path_str)?;
    // Normalizes away a trailing `.` left by requests like `/.zip`.
    let dir: PathBuf = Path::new(stripped).components().collect();

    let meta = tokio::fs::metadata(&dir).await.ok()?;
    if !meta.is_dir() {
        return None;
    }
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());

    let body = stream_archive(format, name.clone(), dir);
    Some(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, format.mime())
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}{}", name, format.extension()),
            )
            .body(body)
            .unwrap(),
    )
}

/// Build the archive into one end of a pipe and return the other end as the
/// response body. Entries are written under `<base>/`.
pub fn stream_archive(format: ArchiveFormat, base: String, dir: PathBuf) -> Body {
    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
    match format {
        ArchiveFormat::Zip => {
            tokio::spawn(write_zip(writer, base, dir));
        }
        ArchiveFormat::Tar | ArchiveFormat::TarGz => {
            let gzip = format == ArchiveFormat::TarGz;
            tokio::task::spawn_blocking(move || {
                let mut out = SyncIoBridge::new(writer);
                let result = if gzip {
                    write_tar(GzEncoder::new(&mut out, Compression::default()), &base, &dir)
                        .and_then(|encoder| encoder.finish())
                        .map(|_| ())
                } else {
                    write_tar(&mut out, &base, &dir).map(|_| ())
                };
                if let Err(err) = result {
                    let _ = out.write_all(format!("\n\nERROR: {err}").as_bytes());
                }
                let _ = out.shutdown();
            });
        }
    }
    Body::from_stream(ReaderStream::new(reader))
}

fn write_tar<W: Write>(writer: W, base: &str, dir: &Path) -> std::io::Result<W> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(true);
    builder.append_dir_all(base, dir)?;
    // into_inner finishes the archive and hands the writer back.
    builder.into_inner()
}

async fn write_zip(mut writer: DuplexStream, base: String, dir: PathBuf) {
    if let Err(err) = zip_dir(&mut writer, &base, &dir).await {
        let _ = writer
            .write_all(format!("\n\nERROR: {err}").as_bytes())
            .await;
    }
    let _ = writer.shutdown().await;
}

async fn zip_dir(writer: &mut DuplexStream, base: &str, dir: &Path) -> std::io::Result<()> {
    let (base_owned, dir_owned) = (base.to_string(), dir.to_path_buf());
    let entries =
        tokio::task::spawn_blocking(move || collect_entries(&base_owned, &dir_owned))
            .await
            .map_err(std::io::Error::other)??;

    let mut zip = ZipFileWriter::with_tokio(writer);
    for entry in entries {
        if entry.is_dir {
            let builder = ZipEntryBuilder::new(entry.name.into(), ZipCompression::Stored);
            zip.write_entry_whole(builder, &[])
                .await
                .map_err(std::io::Error::other)?;
        } else {
            // Open before starting the entry so a vanished file fails cleanly.
            let mut file = tokio::fs::File::open(&entry.path).await?;
            let builder = ZipEntryBuilder::new(entry.name.into(), ZipCompression::Deflate);
            let mut sink = zip
                .write_entry_stream(builder)
                .await
                .map_err(std::io::Error::other)?;
            let mut buf = vec![0u8; PIPE_CAPACITY];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                sink.write_all(&buf[..n]).await?;
            }
            sink.close().await.map_err(std::io::Error::other)?;
        }
    }
    zip.close().await.map_err(std::io::Error::other)?;
    Ok(())
}

struct ZipEntry {
    path: PathBuf,
    name: String,
    is_dir: bool,
}

/// Walk `dir` depth-first, producing entry names under `base/`.
fn collect_entries(base: &str, dir: &Path) -> std::io::Result<Vec<ZipEntry>> {
    let mut out = Vec::new();
    let mut stack = vec![(dir.to_path_buf(), base.to_string())];
    while let Some((path, rel)) = stack.pop() {
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_rel = format!("{rel}/{name}");
            let child = entry.path();
            if child.is_dir() {
                out.push(ZipEntry {
                    path: child.clone(),
                    name: format!("{child_rel}/"),
                    is_dir: true,
                });
                stack.push((child, child_rel));
            } else {
                out.push(ZipEntry {
                    path: child,
                    name: child_rel,
                    is_dir: false,
                });
            }
        }
    }
    Ok(out)
}
