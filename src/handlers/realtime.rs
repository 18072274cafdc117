// src/handlers/realtime.rs

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    fanout::CommentEvent,
    state::AppState,
    utils::jwt::{AuthUser, Caller, bearer_token, resolve_bearer},
};

/// Optional credential on the upgrade request. Browsers cannot set
/// headers on a WebSocket handshake, so the token rides in the query
/// string; 'Authorization: Bearer' still works for other clients.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

/// Subscription control frames sent by the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    #[serde(rename = "join:comments")]
    Join,
    #[serde(rename = "leave:comments")]
    Leave,
}

/// WebSocket endpoint for comment events.
///
/// A missing, invalid or expired token downgrades the connection to a
/// guest subscriber instead of rejecting the handshake. Events flow only
/// after the client sends a join frame.
pub async fn comments_ws(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = params
        .token
        .or_else(|| bearer_token(&headers).map(str::to_string));

    let user = match resolve_bearer(&state.pool, &state.config, token.as_deref()).await {
        Ok(Caller::User(user)) => Some(user),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("WebSocket credential lookup failed: {}", e);
            None
        }
    };

    // Subscribe before the upgrade completes so no event published during
    // the handshake is missed
    let rx = state.hub.subscribe();

    ws.on_upgrade(move |socket| handle_socket(socket, rx, user))
}

async fn handle_socket(
    socket: WebSocket,
    mut rx: broadcast::Receiver<CommentEvent>,
    user: Option<AuthUser>,
) {
    let who = user
        .as_ref()
        .map(|u| u.username.clone())
        .unwrap_or_else(|| "guest".to_string());
    tracing::info!("WebSocket connected ({})", who);

    let (mut sender, mut receiver) = socket.split();
    let mut joined = false;

    loop {
        tokio::select! {
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(ClientMessage::Join) => joined = true,
                            Ok(ClientMessage::Leave) => joined = false,
                            // Unknown frames are ignored
                            Err(_) => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) if joined => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(payload) => payload,
                            Err(e) => {
                                tracing::error!("Failed to serialize comment event: {}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    // Not joined: drop the event
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("WebSocket subscriber lagged, skipped {} events", missed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!("WebSocket disconnected ({})", who);
}
