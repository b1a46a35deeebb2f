//! Presence & delivery router
//!
//! Owns the connection registry and routes persisted chat messages to
//! whichever of the sender and receiver are currently connected.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::{ErrorKind, ServerEvent};
use super::registry::{ConnectionHandle, ConnectionRegistry, Outbound};
use crate::models::{ChatMessage, NewMessage, ValidationError};
use crate::store::{Collection, DocumentStore, StoreError, DEFAULT_STORE_TIMEOUT};

pub const MESSAGES_COLLECTION: &str = "messages";

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Also push each message back to its sender's connection
    pub echo_to_sender: bool,
    /// Bound on the persistence call of a submit
    pub store_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            echo_to_sender: true,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] ValidationError),

    #[error("failed to persist message: {0}")]
    Persistence(#[from] StoreError),
}

impl DeliveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeliveryError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            DeliveryError::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }
}

/// Outcome of a successful submit
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub message: ChatMessage,
    /// Pushes that were queued on a live connection
    pub pushes: usize,
}

pub struct DeliveryRouter {
    registry: ConnectionRegistry,
    messages: Collection<ChatMessage>,
    echo_to_sender: bool,
}

impl DeliveryRouter {
    pub fn new(store: Arc<dyn DocumentStore>, config: RouterConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            messages: Collection::new(store, MESSAGES_COLLECTION).with_timeout(config.store_timeout),
            echo_to_sender: config.echo_to_sender,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn messages(&self) -> &Collection<ChatMessage> {
        &self.messages
    }

    pub fn connect(&self, outbound: Outbound) -> ConnectionHandle {
        let handle = self.registry.open(outbound);
        info!(connection = %handle.id(), "Connection opened");
        handle
    }

    pub fn register(&self, handle: &ConnectionHandle, user_id: &str) -> bool {
        let registered = self.registry.register(handle, user_id);
        if registered {
            info!(connection = %handle.id(), user_id = %user_id.trim(), "User registered");
        } else {
            debug!(connection = %handle.id(), "Ignoring registration with blank user id");
        }
        registered
    }

    /// Validate, timestamp and store a message without delivering it.
    pub async fn persist_message(&self, input: NewMessage) -> Result<ChatMessage, DeliveryError> {
        let draft = input.validate()?;
        let mut message = ChatMessage::from_draft(draft, Utc::now());

        let id = self.messages.insert(&message).await.map_err(|e| {
            warn!(
                sender = %message.sender,
                receiver = %message.receiver,
                error = %e,
                "Failed to persist message"
            );
            DeliveryError::Persistence(e)
        })?;
        message.id = Some(id);
        Ok(message)
    }

    /// Persist a message, then push it to the live sender and receiver.
    ///
    /// Nothing is pushed unless persistence succeeded. Recipients that are
    /// not connected are skipped silently.
    pub async fn submit_message(&self, input: NewMessage) -> Result<DeliveryReport, DeliveryError> {
        let message = self.persist_message(input).await?;

        let (sender_handle, receiver_handle) =
            self.registry.lookup_pair(&message.sender, &message.receiver);

        let targets = [
            sender_handle.filter(|_| self.echo_to_sender),
            receiver_handle,
        ];

        let mut pushes = 0;
        for handle in targets.into_iter().flatten() {
            if handle.push(ServerEvent::ReceiveMessage(message.clone())) {
                pushes += 1;
            } else {
                warn!(
                    connection = %handle.id(),
                    message_id = ?message.id,
                    "Push to closed connection skipped"
                );
            }
        }

        debug!(
            sender = %message.sender,
            receiver = %message.receiver,
            pushes,
            "Message delivered"
        );
        Ok(DeliveryReport { message, pushes })
    }

    /// Drop every registration held by `handle`.
    pub fn disconnect(&self, handle: &ConnectionHandle, reason: &str) {
        let removed = self.registry.remove_connection(handle.id());
        info!(
            connection = %handle.id(),
            users = ?removed,
            reason = %reason,
            "Connection closed"
        );
    }

    pub fn live_users(&self) -> Vec<String> {
        self.registry.user_ids()
    }
}
