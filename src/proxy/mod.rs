//! Fallback proxy.
//!
//! # Responsibilities
//! - Forward requests that resolved to Missing or Directory to the single
//!   configured upstream origin
//! - Rewrite the URI authority/scheme and the `Host` header to the upstream
//!
//! # Design Decisions
//! - No retries, no circuit breaking: upstream and transport failures surface
//!   to the client as-is (a transport error becomes a 502 with the error text)
//! - One shared hyper client, built once at startup

use std::str::FromStr;

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{header, HeaderValue, Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

/// Immutable single-upstream proxy, shared by all requests.
pub struct FallbackProxy {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
}

impl FallbackProxy {
    pub fn new(url: &Url) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let scheme = if url.scheme() == "https" {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        };
        // The URL was validated at startup to be an http(s) URL with a host.
        let authority = Authority::from_str(url.authority()).unwrap();
        Self {
            client,
            scheme,
            authority,
        }
    }

    /// Point the request at the upstream, swapping in its Host header.
    pub fn rewrite(&self, req: &mut Request<Body>) {
        let mut parts = req.uri().clone().into_parts();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some("/".parse().unwrap());
        }
        if let Ok(uri) = Uri::from_parts(parts) {
            *req.uri_mut() = uri;
        }
        req.headers_mut().insert(
            header::HOST,
            HeaderValue::from_str(self.authority.as_str()).unwrap(),
        );
    }

    /// Forward the request. Method, path, headers and body pass through
    /// unmodified apart from the rewrite above.
    pub async fn forward(&self, mut req: Request<Body>) -> Response<Body> {
        self.rewrite(&mut req);
        match self.client.request(req).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, Body::new(body))
            }
            Err(err) => {
                tracing::warn!(error = %err, "fallback upstream error");
                Response::builder()
                    .status(StatusCode::BAD_GATEWAY)
                    .body(Body::from(err.to_string()))
                    .unwrap()
            }
        }
    }
}
