//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::Path;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use clap::Parser;
use http_body_util::BodyExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

use devserve::config::{Options, ServerConfig};
use devserve::HttpServer;

/// Build a router serving `dir` with the given extra command line flags.
#[allow(dead_code)]
pub fn router_for(dir: &Path, args: &[&str]) -> Router {
    let mut opts = Options::parse_from(std::iter::once("devserve").chain(args.iter().copied()));
    opts.directory = dir.to_path_buf();
    let config = ServerConfig::from_options(opts).expect("valid test config");
    HttpServer::new(config).expect("server builds").router()
}

/// Drive one GET through the router.
#[allow(dead_code)]
pub async fn get(router: &Router, path: &str) -> Response<Body> {
    request(router, Request::get(path).body(Body::empty()).unwrap()).await
}

/// Drive one GET with an Accept header.
#[allow(dead_code)]
pub async fn get_accept(router: &Router, path: &str, accept: &str) -> Response<Body> {
    request(
        router,
        Request::get(path)
            .header("accept", accept)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

#[allow(dead_code)]
pub async fn request(router: &Router, req: Request<Body>) -> Response<Body> {
    router.clone().oneshot(req).await.unwrap()
}

#[allow(dead_code)]
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

#[allow(dead_code)]
pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Start a mock upstream that answers every request with a fixed body and
/// echoes the Host header it saw in an `x-seen-host` response header.
#[allow(dead_code)]
pub async fn start_mock_upstream(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let mut read = 0;
                        // Read until the end of the request headers.
                        loop {
                            match tokio::io::AsyncReadExt::read(&mut socket, &mut buf[read..])
                                .await
                            {
                                Ok(0) => break,
                                Ok(n) => {
                                    read += n;
                                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                    if read == buf.len() {
                                        break;
                                    }
                                }
                                Err(_) => break,
                            }
                        }
                        let head = String::from_utf8_lossy(&buf[..read]).to_string();
                        let host = head
                            .lines()
                            .find_map(|line| line.strip_prefix("host: "))
                            .or_else(|| {
                                head.lines().find_map(|line| line.strip_prefix("Host: "))
                            })
                            .unwrap_or("")
                            .trim()
                            .to_string();
                        let reply = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nx-seen-host: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            host,
                            response
                        );
                        let _ = socket.write_all(reply.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
