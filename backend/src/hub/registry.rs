use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::sync::RwLock;

use super::message::{EventNotice, ServerFrame, RECEIVE_UPDATE, USER_JOINED};
use crate::{
    types::{ConnectionId, UserId},
    utils::jwt::Claims,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("Event id is required")]
    EmptyEventId,
    #[error("Invalid arguments for {0}")]
    InvalidArguments(&'static str),
    #[error("Unknown hub method `{0}`")]
    UnknownMethod(String),
    #[error("Connection is not registered")]
    UnknownConnection,
}

/// Frames buffered per connection before further frames are dropped for it.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

struct ConnectionHandle {
    user: UserId,
    tx: Sender<ServerFrame>,
    groups: HashSet<String>,
}

#[derive(Default)]
struct Membership {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

/// Group-scoped broadcast hub.
///
/// Each connection owns a bounded outbound queue. Publishing never waits on a
/// slow member: once a member's queue is full its frames are dropped. Frames
/// from one publisher arrive in order. Membership lives only as long as the
/// connection.
#[derive(Default)]
pub struct EventHub {
    state: RwLock<Membership>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an authenticated connection and hands back its outbound queue.
    pub async fn connect(&self, claims: &Claims) -> (ConnectionId, Receiver<ServerFrame>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.state.write().await.connections.insert(
            id,
            ConnectionHandle {
                user: claims.sub,
                tx,
                groups: HashSet::new(),
            },
        );
        tracing::info!(connection_id = %id, user_id = %claims.sub, "Hub connection opened");
        (id, rx)
    }

    pub async fn join_group(&self, connection: ConnectionId, event_id: &str) -> Result<(), HubError> {
        let event_id = group_key(event_id).ok_or(HubError::EmptyEventId)?;
        {
            let mut state = self.state.write().await;
            let handle = state
                .connections
                .get_mut(&connection)
                .ok_or(HubError::UnknownConnection)?;
            handle.groups.insert(event_id.to_string());
            tracing::debug!(connection_id = %connection, user_id = %handle.user, event_id, "Joined event group");
            state
                .groups
                .entry(event_id.to_string())
                .or_default()
                .insert(connection);
        }

        self.publish(event_id, USER_JOINED, Value::String(connection.to_string()))
            .await;
        Ok(())
    }

    /// Silently ignores blank ids and groups the connection never joined.
    pub async fn leave_group(&self, connection: ConnectionId, event_id: &str) {
        let Some(event_id) = group_key(event_id) else {
            return;
        };
        let mut state = self.state.write().await;
        if let Some(handle) = state.connections.get_mut(&connection) {
            handle.groups.remove(event_id);
        }
        if let Some(members) = state.groups.get_mut(event_id) {
            members.remove(&connection);
            if members.is_empty() {
                state.groups.remove(event_id);
            }
        }
    }

    /// Queues `target(argument)` for every current member of `event_id`.
    /// Returns how many members it was queued for.
    pub async fn publish(&self, event_id: &str, target: &str, argument: Value) -> usize {
        let Some(event_id) = group_key(event_id) else {
            return 0;
        };
        let state = self.state.read().await;
        let Some(members) = state.groups.get(event_id) else {
            return 0;
        };

        let frame = ServerFrame::event(target, argument);
        let delivered = members
            .iter()
            .filter_map(|id| state.connections.get(id).map(|handle| (id, handle)))
            .filter(|(id, handle)| match handle.tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(connection_id = %id, event_id, target, "Outbound queue full, frame dropped");
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            })
            .count();
        tracing::debug!(event_id, target, delivered, "Published to event group");
        delivered
    }

    /// Publishes a tagged `ReceiveUpdate` notice to the notice's event group.
    pub async fn notify(&self, notice: EventNotice) -> usize {
        let event_id = notice.event_id.clone();
        match serde_json::to_value(&notice) {
            Ok(payload) => self.publish(&event_id, RECEIVE_UPDATE, payload).await,
            Err(err) => {
                tracing::error!(error = %err, "Failed to encode event notice");
                0
            }
        }
    }

    /// Client-invoked text broadcast. Unlike leaving, an empty event id is an error.
    pub async fn send_text_message(
        &self,
        connection: ConnectionId,
        event_id: &str,
        text: &str,
    ) -> Result<usize, HubError> {
        let event_id = group_key(event_id).ok_or(HubError::EmptyEventId)?;
        tracing::debug!(connection_id = %connection, event_id, "Text message from client");
        Ok(self.notify(EventNotice::text(event_id, text)).await)
    }

    /// Drops the connection and every group membership it held.
    pub async fn on_disconnect(&self, connection: ConnectionId) {
        let mut state = self.state.write().await;
        let Some(handle) = state.connections.remove(&connection) else {
            return;
        };
        for group in &handle.groups {
            if let Some(members) = state.groups.get_mut(group) {
                members.remove(&connection);
                if members.is_empty() {
                    state.groups.remove(group);
                }
            }
        }
        tracing::info!(
            connection_id = %connection,
            user_id = %handle.user,
            groups = handle.groups.len(),
            "Hub connection closed"
        );
    }

    pub async fn group_size(&self, event_id: &str) -> usize {
        self.state
            .read()
            .await
            .groups
            .get(event_id)
            .map_or(0, HashSet::len)
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }
}

fn group_key(event_id: &str) -> Option<&str> {
    let key = event_id.trim();
    (!key.is_empty()).then_some(key)
}
