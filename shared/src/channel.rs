use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

use crate::protocol::{InboundEvent, InboundKind, Request};

/// Error carried by an acknowledgment, as reported by the remote side
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of a request, as delivered to its ack.
pub type AckResult = Result<Value, RemoteError>;

/// Invoked by the remote side exactly once per emitted request.
pub type AckFn = Box<dyn FnOnce(AckResult)>;

/// Handler for inbound events. Handlers are shared so a Channel can snapshot
/// its handler list before dispatching.
pub type EventHandler = Rc<dyn Fn(&InboundEvent)>;

/// Duplex, event-addressed transport.
///
/// Connection lifecycle, retries and wire encoding belong to the
/// implementation. Everything runs on one thread: acks and inbound events
/// are delivered one at a time, and an implementation may invoke `ack`
/// before `emit` returns.
pub trait Channel {
    /// Sends `request`. `ack` is invoked exactly once with the remote result,
    /// or never if the acknowledgment is lost.
    fn emit(&self, request: Request, ack: AckFn);

    /// Registers `handler` for every future inbound event of `kind`.
    fn on(&self, kind: InboundKind, handler: EventHandler);
}
