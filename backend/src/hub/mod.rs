//! Realtime event-group broadcast hub and its WebSocket transport.

pub mod message;
pub mod registry;
pub mod socket;

pub use message::{EventNotice, NoticeKind, ServerFrame};
pub use registry::{EventHub, HubError};
