use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Extension,
};
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;

use super::{
    message::{HubMethod, Invocation, ServerFrame},
    EventHub,
};
use crate::{state::AppState, types::ConnectionId, utils::jwt::Claims};

/// Upgrades an already-authenticated request to a hub connection.
pub async fn event_hub_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| bridge(hub, claims, socket))
}

async fn bridge(hub: Arc<EventHub>, claims: Claims, socket: WebSocket) {
    let (connection, mut outbound) = hub.connect(&claims).await;
    let (mut sink, mut stream) = socket.split();

    'sesh: loop {
        tokio::select! {
            biased;
            frame = outbound.recv() => match frame {
                Some(frame) => if send_frame(&mut sink, &frame).await.is_err() { break 'sesh },
                None => break 'sesh,
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let reply = dispatch(&hub, connection, text.as_str()).await;
                    if send_frame(&mut sink, &reply).await.is_err() { break 'sesh }
                }
                Some(Ok(Message::Close(_))) => break 'sesh,
                Some(Err(err)) => {
                    tracing::debug!(connection_id = %connection, error = %err, "Hub transport error");
                    break 'sesh
                }
                None => break 'sesh,
                _ => continue 'sesh,
            },
        }
    }

    hub.on_disconnect(connection).await;
}

async fn send_frame<S>(sink: &mut S, frame: &ServerFrame) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match serde_json::to_string(frame) {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(err) => {
            tracing::error!(error = %err, "Failed to encode hub frame");
            Ok(())
        }
    }
}

/// Runs one client frame against the hub and builds its completion.
/// Malformed frames produce an error completion rather than closing the socket.
pub async fn dispatch(hub: &EventHub, connection: ConnectionId, text: &str) -> ServerFrame {
    let invocation = match Invocation::parse(text) {
        Ok(invocation) => invocation,
        Err(err) => {
            return ServerFrame::completion(None, Some(format!("Invalid hub message: {}", err)))
        }
    };

    let outcome = match invocation.method() {
        Ok(HubMethod::JoinEventGroup { event_id }) => hub.join_group(connection, &event_id).await,
        Ok(HubMethod::LeaveEventGroup { event_id }) => {
            hub.leave_group(connection, &event_id).await;
            Ok(())
        }
        Ok(HubMethod::SendTextMessage { event_id, text }) => hub
            .send_text_message(connection, &event_id, &text)
            .await
            .map(|_| ()),
        Err(err) => Err(err),
    };

    if let Err(err) = &outcome {
        tracing::debug!(connection_id = %connection, target = %invocation.target, error = %err, "Hub invocation failed");
    }
    ServerFrame::completion(invocation.invocation_id, outcome.err().map(|e| e.to_string()))
}
