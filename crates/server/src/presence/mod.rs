//! Realtime presence tracking and message delivery

pub mod events;
pub mod registry;
pub mod router;

pub use events::{ClientEvent, ErrorKind, ErrorPayload, ServerEvent};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, Outbound};
pub use router::{DeliveryError, DeliveryReport, DeliveryRouter, RouterConfig, MESSAGES_COLLECTION};
