//! # Replica Shared
//! Wire vocabulary shared between replica clients and Channel implementations.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod channel;
mod protocol;
mod record;

pub use channel::{AckFn, AckResult, Channel, EventHandler, RemoteError};
pub use protocol::{Broadcast, BroadcastKind, InboundEvent, InboundKind, ProtocolError, Request};
pub use record::{fields_id, record_id, Fields, RecordId, DEFAULT_ID_FIELD};
