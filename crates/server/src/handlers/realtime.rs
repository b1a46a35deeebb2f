//! Realtime chat over WebSocket
//!
//! One actor per connection: a writer task drains the connection's
//! outbound queue into the socket sink while the reader loop turns
//! inbound frames into router operations.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Json,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AppState;
use crate::presence::{ClientEvent, ConnectionHandle, DeliveryRouter, ErrorKind, ServerEvent};

/// GET /ws
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let router = state.router.clone();
    ws.on_upgrade(move |socket| run_connection(socket, router))
}

/// GET /online
pub async fn online_users(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.router.live_users())
}

async fn run_connection(socket: WebSocket, router: Arc<DeliveryRouter>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();

    let handle = router.connect(tx);
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx, handle.clone()));

    let reason = loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_frame(&router, &handle, text.as_str()).await;
            }
            Some(Ok(Message::Binary(_))) => {
                handle.push(ServerEvent::error(
                    ErrorKind::MalformedPayload,
                    "binary frames are not supported",
                ));
            }
            // Pings are answered by the protocol layer
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(frame) if !frame.reason.is_empty() => {
                        format!("client closed ({}): {}", frame.code, frame.reason.as_str())
                    }
                    Some(frame) => format!("client closed ({})", frame.code),
                    None => "client closed".to_string(),
                };
            }
            Some(Err(e)) => break format!("receive error: {}", e),
            None => break "stream ended".to_string(),
        }
    };

    router.disconnect(&handle, &reason);
    writer_handle.abort();
}

async fn writer_task(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    handle: ConnectionHandle,
) {
    while let Some(event) = rx.recv().await {
        let text = match event.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(connection = %handle.id(), error = %e, "Failed to encode event");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            debug!(connection = %handle.id(), error = %e, "Socket write failed");
            break;
        }
    }
}

/// Apply one inbound text frame to the router.
///
/// Failures are reported back to the originating connection only.
pub async fn handle_text_frame(router: &DeliveryRouter, handle: &ConnectionHandle, text: &str) {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(connection = %handle.id(), error = %e, "Malformed frame");
            handle.push(ServerEvent::error(
                ErrorKind::MalformedPayload,
                format!("malformed frame: {}", e),
            ));
            return;
        }
    };

    match event {
        ClientEvent::Register(user_id) => {
            router.register(handle, &user_id);
        }
        ClientEvent::SendMessage(input) => match router.submit_message(input).await {
            Ok(report) => {
                info!(
                    connection = %handle.id(),
                    message_id = ?report.message.id,
                    pushes = report.pushes,
                    "Message submitted"
                );
            }
            Err(e) => {
                handle.push(ServerEvent::error(e.kind(), e.to_string()));
            }
        },
    }
}
