//! The request pipeline.
//!
//! Decision order is fixed and each branch is terminal:
//! 1. classify the path (pushstate substitution included)
//! 2. fallback proxy for Missing or Directory targets
//! 3. archive detection for Missing targets
//! 4. 404
//! 5. trailing-slash redirect for directories
//! 6. index.html substitution, then listing (or 403)
//! 7. file streaming
//!
//! The fallback deliberately outranks listings and archives but never an
//! existing file; index substitution runs after the slash redirect so
//! directory URLs normalize before content is chosen.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, Response, StatusCode};

use crate::files::stream::plain_response;
use crate::files::{archive, classify, listing, stream};
use crate::http::AppState;

/// Serve one request. Mounted for every method and path.
pub async fn serve(State(state): State<AppState>, req: Request<Body>) -> Response<Body> {
    let path = req.uri().path().to_string();
    let config = &state.config;

    let target = classify::classify(config, &path).await;

    if let Some(proxy) = &state.fallback {
        if target.is_missing() || target.is_dir() {
            return proxy.forward(req).await;
        }
    }

    if !config.no_archive && target.is_missing() {
        if let Some(response) = archive::try_archive(&target.path).await {
            return response;
        }
    }

    if target.is_missing() {
        return plain_response(StatusCode::NOT_FOUND, "Not found");
    }

    if target.is_dir() && !config.no_slash && !path.ends_with('/') {
        return Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, format!("{path}/"))
            .body(Body::from("Redirecting (must use slash for directories)"))
            .unwrap();
    }

    let target = if target.is_dir() && !config.no_index {
        classify::apply_index(target).await
    } else {
        target
    };

    if target.is_dir() {
        if config.no_list {
            return plain_response(StatusCode::FORBIDDEN, "Listing not allowed");
        }
        return listing::render(config, req.headers(), &target.path).await;
    }

    stream::stream_file(
        config,
        &state.served,
        state.watcher.as_deref(),
        req.method(),
        req.headers(),
        &target.path,
    )
    .await
}
