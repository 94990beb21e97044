//! Sync WebSocket: pushes register and media-store changes to clients
//!
//! One socket per dashboard/viewer. The client subscribes to topics and
//! the server streams versioned state frames. Every subscription opens
//! with a synthetic current-state frame (from the hub cache, primed from
//! the database on a cold topic) so a freshly connected viewer renders
//! immediately instead of waiting for the next real change. Per topic,
//! frames arrive seq-ascending; a forwarder that lags the broadcast
//! channel jumps forward to the cached latest state rather than
//! replaying stale history.
//!
//! Unsubscribing aborts the topic's forwarder task before the command is
//! acknowledged, so no frame for that topic can arrive afterwards. The
//! socket closing tears down every forwarder the same way.

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::CookieJar;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::AppState;
use crate::services::cookies;
use crate::services::notify::{self, ActiveMediaState, LibraryState, Versioned};
use crate::services::session::{self, Session};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/sync/ws", get(sync_ws))
}

/// A subscribable topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
enum Topic {
    /// What is live for one controller
    ActiveMedia { controller_id: Uuid },
    /// The full media list
    Library,
}

/// WebSocket command from client
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum SyncCommand {
    Subscribe {
        #[serde(flatten)]
        topic: Topic,
    },
    Unsubscribe {
        #[serde(flatten)]
        topic: Topic,
    },
}

/// WebSocket frame to client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SyncFrame {
    ActiveMedia(Versioned<ActiveMediaState>),
    Library(Versioned<LibraryState>),
    Error { message: String },
}

impl SyncFrame {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

/// GET /sync/ws - WebSocket for live state updates
async fn sync_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate JWT from cookie before upgrading
    let access_token = jar
        .get(cookies::config::ACCESS_TOKEN_NAME)
        .map(|c| c.value())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let session = session::validate_access_token(access_token, &state.jwt_secret)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(ws.on_upgrade(move |socket| handle_sync_ws(socket, state, session)))
}

async fn handle_sync_ws(socket: WebSocket, state: Arc<AppState>, _session: Session) {
    let (mut sender, mut receiver) = socket.split();

    // Forwarders push serialized frames here; the select loop below owns
    // the socket's send half
    let (frames_tx, mut frames_rx) = mpsc::channel::<String>(32);
    let mut subscriptions: HashMap<Topic, JoinHandle<()>> = HashMap::new();

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let msg = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // Ignore binary, ping, pong
                    Some(Err(e)) => {
                        tracing::debug!("Sync socket error: {}", e);
                        break;
                    }
                };

                let cmd: SyncCommand = match serde_json::from_str(&msg) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        let frame = SyncFrame::Error {
                            message: format!("Invalid command: {}", e),
                        };
                        if sender.send(Message::Text(frame.to_json().into())).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                match cmd {
                    SyncCommand::Subscribe { topic } => {
                        if subscriptions.contains_key(&topic) {
                            continue; // already streaming this topic
                        }
                        let task = spawn_forwarder(
                            topic,
                            state.clone(),
                            frames_tx.clone(),
                        );
                        subscriptions.insert(topic, task);
                    }
                    SyncCommand::Unsubscribe { topic } => {
                        // Abort before acknowledging: once this returns,
                        // no further frame for the topic can be queued.
                        // Repeated unsubscribes fall through harmlessly.
                        if let Some(task) = subscriptions.remove(&topic) {
                            task.abort();
                        }
                    }
                }
            }

            outgoing = frames_rx.recv() => {
                match outgoing {
                    Some(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break, // unreachable while we hold frames_tx
                }
            }
        }
    }

    for (_, task) in subscriptions {
        task.abort();
    }
    let _ = sender.close().await;
}

/// Spawn the per-topic forwarder: snapshot first, then live events.
fn spawn_forwarder(
    topic: Topic,
    state: Arc<AppState>,
    frames: mpsc::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match topic {
            Topic::ActiveMedia { controller_id } => {
                forward_active(controller_id, state, frames).await;
            }
            Topic::Library => {
                forward_library(state, frames).await;
            }
        }
    })
}

async fn forward_active(
    controller_id: Uuid,
    state: Arc<AppState>,
    frames: mpsc::Sender<String>,
) {
    let (cached, mut rx) = state.hub.subscribe_active(controller_id);

    // Synthetic current-state event before any live update. The hub
    // cache is authoritative once warm; a cold topic is primed from the
    // database (idempotent, publishers racing us win).
    let snapshot = match cached {
        Some(snapshot) => snapshot,
        None => match notify::resolve_active_state(&state.db, controller_id).await {
            Ok(current) => state.hub.prime_active(current),
            Err(e) => {
                tracing::error!("Active snapshot fetch failed: {}", e);
                let frame = SyncFrame::Error {
                    message: "Failed to load current state".into(),
                };
                let _ = frames.send(frame.to_json()).await;
                return;
            }
        },
    };

    let mut last_seq = snapshot.seq;
    if frames
        .send(SyncFrame::ActiveMedia(snapshot).to_json())
        .await
        .is_err()
    {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(event) if event.seq > last_seq => {
                last_seq = event.seq;
                if frames
                    .send(SyncFrame::ActiveMedia(event).to_json())
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Ok(_) => continue, // stale relative to what we already sent
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Skip the backlog and re-sync from the latest state
                tracing::debug!("Active forwarder lagged {} events", skipped);
                if let Some(latest) = state.hub.cached_active(controller_id) {
                    if latest.seq > last_seq {
                        last_seq = latest.seq;
                        if frames
                            .send(SyncFrame::ActiveMedia(latest).to_json())
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn forward_library(state: Arc<AppState>, frames: mpsc::Sender<String>) {
    let (cached, mut rx) = state.hub.subscribe_library();

    let snapshot = match cached {
        Some(snapshot) => snapshot,
        None => match crate::domain::media::list_media(&state.db, None).await {
            Ok(items) => state.hub.prime_library(LibraryState { media: items }),
            Err(e) => {
                tracing::error!("Library snapshot fetch failed: {}", e);
                let frame = SyncFrame::Error {
                    message: "Failed to load media list".into(),
                };
                let _ = frames.send(frame.to_json()).await;
                return;
            }
        },
    };

    let mut last_seq = snapshot.seq;
    if frames
        .send(SyncFrame::Library(snapshot).to_json())
        .await
        .is_err()
    {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(event) if event.seq > last_seq => {
                last_seq = event.seq;
                if frames
                    .send(SyncFrame::Library(event).to_json())
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Library forwarder lagged {} events", skipped);
                if let Some(latest) = state.hub.cached_library() {
                    if latest.seq > last_seq {
                        last_seq = latest.seq;
                        if frames
                            .send(SyncFrame::Library(latest).to_json())
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        let cmd: SyncCommand = serde_json::from_str(
            r#"{"action":"subscribe","topic":"active_media","controller_id":"7f3d0a1e-8c2b-4f60-9d5a-2e1b3c4d5e6f"}"#,
        )
        .unwrap();
        assert!(matches!(
            cmd,
            SyncCommand::Subscribe {
                topic: Topic::ActiveMedia { .. }
            }
        ));

        let cmd: SyncCommand =
            serde_json::from_str(r#"{"action":"unsubscribe","topic":"library"}"#).unwrap();
        assert!(matches!(
            cmd,
            SyncCommand::Unsubscribe {
                topic: Topic::Library
            }
        ));

        assert!(serde_json::from_str::<SyncCommand>(r#"{"action":"noop"}"#).is_err());
    }

    #[test]
    fn test_frame_shape() {
        let frame = SyncFrame::ActiveMedia(Versioned {
            seq: 3,
            state: ActiveMediaState {
                controller_id: Uuid::nil(),
                media: None,
                activated_at: None,
            },
        });
        let json: serde_json::Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(json["type"], "active_media");
        assert_eq!(json["seq"], 3);
        assert!(json["media"].is_null());
    }
}
