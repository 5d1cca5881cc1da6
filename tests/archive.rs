//! Integration tests for streamed archives and fallback proxying.

use std::collections::HashMap;
use std::io::Read;

use axum::http::{header, StatusCode};
use flate2::read::GzDecoder;

mod common;
use common::{body_bytes, body_string, get, router_for, start_mock_upstream};

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("mydir")).unwrap();
    std::fs::write(dir.path().join("mydir/a.txt"), "alpha").unwrap();
    std::fs::write(dir.path().join("mydir/b.txt"), "bravo").unwrap();
    std::fs::write(dir.path().join("plain.txt"), "plain").unwrap();
    dir
}

#[tokio::test(flavor = "multi_thread")]
async fn zip_download_round_trips() {
    let dir = site();
    let router = router_for(dir.path(), &[]);

    let response = get(&router, "/mydir.zip").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=mydir.zip"
    );

    let bytes = body_bytes(response).await;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut contents = HashMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        contents.insert(file.name().to_string(), data);
    }
    assert_eq!(contents["mydir/a.txt"], b"alpha");
    assert_eq!(contents["mydir/b.txt"], b"bravo");
}

#[tokio::test(flavor = "multi_thread")]
async fn tar_download_round_trips() {
    let dir = site();
    let router = router_for(dir.path(), &[]);

    let response = get(&router, "/mydir.tar").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-tar"
    );

    let bytes = body_bytes(response).await;
    let contents = read_tar(&bytes[..]);
    assert_eq!(contents["mydir/a.txt"], b"alpha");
    assert_eq!(contents["mydir/b.txt"], b"bravo");
}

#[tokio::test(flavor = "multi_thread")]
async fn tar_gz_wins_suffix_detection_and_round_trips() {
    let dir = site();
    let router = router_for(dir.path(), &[]);

    let response = get(&router, "/mydir.tar.gz").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/gzip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=mydir.tar.gz"
    );

    let bytes = body_bytes(response).await;
    let contents = read_tar(GzDecoder::new(&bytes[..]));
    assert_eq!(contents["mydir/a.txt"], b"alpha");
    assert_eq!(contents["mydir/b.txt"], b"bravo");
}

fn read_tar<R: Read>(reader: R) -> HashMap<String, Vec<u8>> {
    let mut archive = tar::Archive::new(reader);
    let mut contents = HashMap::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        contents.insert(path, data);
    }
    contents
}

#[tokio::test(flavor = "multi_thread")]
async fn zip_streams_files_larger_than_the_pipe() {
    let dir = site();
    let big = vec![b'x'; 300 * 1024];
    std::fs::write(dir.path().join("mydir/big.bin"), &big).unwrap();
    let router = router_for(dir.path(), &[]);

    let response = get(&router, "/mydir.zip").await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = body_bytes(response).await;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name("mydir/big.bin").unwrap();
    let mut data = Vec::new();
    file.read_to_end(&mut data).unwrap();
    assert_eq!(data, big);
}

#[tokio::test(flavor = "multi_thread")]
async fn archive_failure_appends_error_marker() {
    // A dangling symlink makes the walk fail partway through; the bytes
    // already flushed must end with a visible marker, never a silent cut.
    let dir = site();
    std::os::unix::fs::symlink(
        dir.path().join("mydir/gone.txt"),
        dir.path().join("mydir/broken.txt"),
    )
    .unwrap();
    let router = router_for(dir.path(), &[]);

    for path in ["/mydir.tar", "/mydir.zip"] {
        let response = get(&router, path).await;
        // The status was committed before the failure surfaced.
        assert_eq!(response.status(), StatusCode::OK, "path {path}");
        let body = body_bytes(response).await;
        let marker = b"\n\nERROR:";
        assert!(
            body.windows(marker.len()).any(|w| w == marker),
            "path {path} body lacks the error marker"
        );
    }
}

#[tokio::test]
async fn archive_suffix_without_directory_is_404() {
    let dir = site();
    let router = router_for(dir.path(), &[]);

    let response = get(&router, "/nosuchdir.zip").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn no_archive_disables_downloads() {
    let dir = site();
    let router = router_for(dir.path(), &["--no-archive"]);

    let response = get(&router, "/mydir.zip").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fallback_outranks_404_and_archives() {
    let dir = site();
    let upstream = start_mock_upstream("from upstream").await;
    let router = router_for(
        dir.path(),
        &["--fallback", &format!("http://{upstream}")],
    );

    // Missing non-archive path: forwarded, never 404.
    let response = get(&router, "/missing/page").await;
    assert_eq!(response.status(), StatusCode::OK);
    let host = response.headers()["x-seen-host"].clone();
    assert_eq!(host.to_str().unwrap(), upstream.to_string());
    assert_eq!(body_string(response).await, "from upstream");

    // Directories are forwarded too.
    let response = get(&router, "/mydir/").await;
    assert_eq!(body_string(response).await, "from upstream");

    // An archive-suffixed miss is also forwarded: fallback checks first.
    let response = get(&router, "/mydir.zip").await;
    assert_eq!(body_string(response).await, "from upstream");
}

#[tokio::test]
async fn fallback_never_outranks_existing_files() {
    let dir = site();
    let upstream = start_mock_upstream("from upstream").await;
    let router = router_for(
        dir.path(),
        &["--fallback", &format!("http://{upstream}")],
    );

    let response = get(&router, "/plain.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "plain");
}
