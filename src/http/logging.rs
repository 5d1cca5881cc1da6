//! Per-request logging middleware.
//!
//! # Responsibilities
//! - Capture {method, path, status, duration, bytes} per request
//! - Count the bytes actually written to the network, not the file size, so
//!   range requests and aborted downloads report accurate sizes
//!
//! # Design Decisions
//! - The response body is wrapped in a counting decorator implementing
//!   `http_body::Body`; the log line is emitted when the body completes, or
//!   from `Drop` when the client disconnects mid-stream.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{Method, Response, StatusCode};
use axum::middleware::Next;
use http_body::{Body as HttpBody, Frame, SizeHint};

/// Middleware wrapping every response body in a [`CountedBody`].
pub async fn log_requests(req: Request, next: Next) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;
    let (parts, body) = response.into_parts();
    let counted = CountedBody {
        inner: body,
        line: Some(LogLine {
            method,
            path,
            status: parts.status,
            start,
            bytes: 0,
        }),
    };
    Response::from_parts(parts, Body::new(counted))
}

struct LogLine {
    method: Method,
    path: String,
    status: StatusCode,
    start: Instant,
    bytes: u64,
}

impl LogLine {
    fn emit(&self) {
        tracing::info!(
            method = %self.method,
            path = %self.path,
            status = self.status.as_u16(),
            duration = ?self.start.elapsed(),
            bytes = self.bytes,
            "request"
        );
    }
}

/// Body decorator that counts transferred data frames and logs on completion.
pub struct CountedBody {
    inner: Body,
    line: Option<LogLine>,
}

impl HttpBody for CountedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(line) = &mut this.line {
                    if let Some(data) = frame.data_ref() {
                        line.bytes += data.len() as u64;
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(None) => {
                if let Some(line) = this.line.take() {
                    line.emit();
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CountedBody {
    // Client disconnects drop the body before end-of-stream.
    fn drop(&mut self) {
        if let Some(line) = self.line.take() {
            line.emit();
        }
    }
}
