//! Integration tests for directory listings and content negotiation.

use axum::http::{header, StatusCode};

mod common;
use common::{body_string, get_accept, router_for};

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.txt"), "bb").unwrap();
    std::fs::write(dir.path().join("A.txt"), "a").unwrap();
    std::fs::create_dir(dir.path().join("c")).unwrap();
    std::fs::write(dir.path().join(".DS_Store"), "junk").unwrap();
    dir
}

fn names(listing: &serde_json::Value) -> Vec<String> {
    listing["Files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["Name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn json_listing_has_entries_and_aggregates() {
    let dir = site();
    let router = router_for(dir.path(), &[]);

    let response = get_accept(&router, "/", "application/json").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let listing: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();

    assert_eq!(listing["Path"], ".");
    assert_eq!(listing["Parent"], "");
    assert_eq!(listing["NumFiles"], 2);
    assert_eq!(listing["NumDirs"], 1);
    assert_eq!(listing["TotalSize"], 3);
    assert_eq!(listing["Archive"], true);
    // .DS_Store is never listed.
    assert!(!names(&listing).iter().any(|n| n.contains("DS_Store")));
}

#[tokio::test]
async fn json_listing_is_idempotent() {
    let dir = site();
    let router = router_for(dir.path(), &[]);

    let first = body_string(get_accept(&router, "/", "application/json").await).await;
    let second = body_string(get_accept(&router, "/", "application/json").await).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn case_insensitive_sort_order() {
    let dir = site();
    let router = router_for(dir.path(), &["--case-insensitive"]);

    let response = get_accept(&router, "/", "application/json").await;
    let listing: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(names(&listing), ["A.txt", "b.txt", "c/"]);
}

#[tokio::test]
async fn directories_first_sort_order() {
    let dir = site();
    let router = router_for(dir.path(), &["--case-insensitive", "--dirs-first"]);

    let response = get_accept(&router, "/", "application/json").await;
    let listing: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(names(&listing), ["c/", "A.txt", "b.txt"]);
}

#[tokio::test]
async fn default_representation_is_plain_names() {
    let dir = site();
    let router = router_for(dir.path(), &["--case-insensitive"]);

    let response = get_accept(&router, "/", "image/png").await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(body_string(response).await, "A.txt\nb.txt\nc/\n");
}

#[tokio::test]
async fn first_accept_match_wins() {
    let dir = site();
    let router = router_for(dir.path(), &[]);

    let response = get_accept(&router, "/", "text/html, application/json").await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    let html = body_string(response).await;
    assert!(html.contains("<table>"));

    // Entries without a slash are skipped, not errors.
    let response = get_accept(&router, "/", "garbage, application/xml").await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");
    let xml = body_string(response).await;
    assert!(xml.contains("<NumFiles>2</NumFiles>"));
}

#[tokio::test]
async fn html_listing_offers_archives_only_when_enabled() {
    let dir = site();

    let router = router_for(dir.path(), &[]);
    let html = body_string(get_accept(&router, "/", "text/html").await).await;
    assert!(html.contains("/.zip"));
    assert!(html.contains(".tar.gz"));

    let router = router_for(dir.path(), &["--no-archive"]);
    let html = body_string(get_accept(&router, "/", "text/html").await).await;
    assert!(!html.contains(".zip"));
}

#[tokio::test]
async fn subdirectory_listing_links_to_parent() {
    let dir = site();
    std::fs::write(dir.path().join("c/deep.txt"), "x").unwrap();
    let router = router_for(dir.path(), &[]);

    let response = get_accept(&router, "/c/", "application/json").await;
    let listing: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(listing["Path"], "c");
    assert_eq!(listing["Parent"], "/");
    assert_eq!(listing["Files"][0]["Path"], "/c/deep.txt");
}

#[tokio::test]
async fn inaccessible_entries_stay_listed() {
    // A dangling symlink stats to nothing but must still appear.
    let dir = site();
    std::os::unix::fs::symlink(
        dir.path().join("gone.txt"),
        dir.path().join("dangling.txt"),
    )
    .unwrap();
    let router = router_for(dir.path(), &[]);

    let response = get_accept(&router, "/", "application/json").await;
    let listing: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    let entry = listing["Files"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["Name"] == "dangling.txt")
        .expect("dangling entry listed");
    assert_eq!(entry["Accessible"], false);
}
