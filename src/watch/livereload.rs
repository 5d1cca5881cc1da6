//! Browser push channel for live reload.
//!
//! The wire protocol is intentionally tiny: clients connect a WebSocket to
//! `/livereload` and receive a `reload:<path>` text frame whenever a watched
//! file changes. No acknowledgment, no backpressure.

use std::path::Path;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::http::AppState;

/// Handle to the reload broadcast channel. Cheap to clone; `notify` is
/// fire-and-forget and succeeds with zero connected clients.
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<String>,
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Tell connected browsers that `path` changed.
    pub fn notify(&self, path: &Path) {
        let _ = self.tx.send(path.display().to_string());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket endpoint browsers connect to for reload notifications.
pub async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let reload = state.reload.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, reload))
}

async fn handle_socket(socket: WebSocket, reload: Option<LiveReload>) {
    // The route is only mounted when live reload is enabled.
    let Some(reload) = reload else { return };
    let (mut sender, mut receiver) = socket.split();
    let mut rx = reload.subscribe();
    tracing::debug!("browser connected for live reload");

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(path) => {
                    let frame = Message::Text(format!("reload:{path}").into());
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                }
                // A lagging client just misses reloads.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
