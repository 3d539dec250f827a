//! Event vocabulary exchanged over a [`Channel`](crate::Channel).
//!
//! Outbound traffic is a [`Request`] answered by exactly one ack. Inbound
//! traffic is an [`InboundEvent`]: either the connection coming up, or a
//! generic `broadcast` carrying a [`BroadcastKind`] discriminator, the
//! affected collection name and the affected records or identifiers.

mod error;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::ProtocolError;

use crate::record::{Fields, RecordId};

/// An outbound request. Every variant is emitted with an ack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Request {
    /// Ack payload: sequence of field maps
    RetrieveAll { collection: String },
    /// Ack payload: a field map
    RetrieveOne { collection: String, id: RecordId },
    /// Ack payload: the created field map
    Create { collection: String, fields: Value },
    Update {
        collection: String,
        filter: Value,
        fields: Value,
    },
    DeleteAll { collection: String },
    UpdateOne {
        collection: String,
        id: RecordId,
        fields: Fields,
    },
    DeleteOne { collection: String, id: RecordId },
}

impl Request {
    /// Wire name of the event this request is emitted under.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::RetrieveAll { .. } => "retrieveAll",
            Self::RetrieveOne { .. } => "retrieveOne",
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::DeleteAll { .. } => "deleteAll",
            Self::UpdateOne { .. } => "updateOne",
            Self::DeleteOne { .. } => "deleteOne",
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::RetrieveAll { collection }
            | Self::RetrieveOne { collection, .. }
            | Self::Create { collection, .. }
            | Self::Update { collection, .. }
            | Self::DeleteAll { collection }
            | Self::UpdateOne { collection, .. }
            | Self::DeleteOne { collection, .. } => collection,
        }
    }

    /// Positional arguments in wire order, collection name first. The ack
    /// is not part of this list.
    pub fn args(&self) -> Vec<Value> {
        let collection = Value::String(self.collection().to_string());
        match self {
            Self::RetrieveAll { .. } | Self::DeleteAll { .. } => vec![collection],
            Self::RetrieveOne { id, .. } | Self::DeleteOne { id, .. } => {
                vec![collection, id.to_value()]
            }
            Self::Create { fields, .. } => vec![collection, fields.clone()],
            Self::Update { filter, fields, .. } => vec![collection, filter.clone(), fields.clone()],
            Self::UpdateOne { id, fields, .. } => {
                vec![collection, id.to_value(), Value::Object(fields.clone())]
            }
        }
    }

    pub fn log(&self) -> String {
        match self {
            Self::RetrieveOne { id, .. } | Self::UpdateOne { id, .. } | Self::DeleteOne { id, .. } => {
                format!("{} {}/{}", self.event_name(), self.collection(), id)
            }
            _ => format!("{} {}", self.event_name(), self.collection()),
        }
    }
}

/// Kind of change announced by a broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastKind {
    Created,
    Updated,
    DeletedOne,
    DeletedAll,
}

impl BroadcastKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::DeletedOne => "deletedOne",
            Self::DeletedAll => "deletedAll",
        }
    }
}

impl fmt::Display for BroadcastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for BroadcastKind {
    type Err = ProtocolError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deletedOne" => Ok(Self::DeletedOne),
            "deletedAll" => Ok(Self::DeletedAll),
            other => Err(ProtocolError::UnknownBroadcastKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// An unsolicited change notification, scoped to one collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub kind: BroadcastKind,
    pub collection: String,
    /// Affected records (`created`, `updated`) or identifiers (`deletedOne`).
    /// May be empty for `deletedAll`.
    pub data: Vec<Value>,
}

impl Broadcast {
    pub fn new(kind: BroadcastKind, collection: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            kind,
            collection: collection.into(),
            data,
        }
    }

    pub fn created(collection: impl Into<String>, data: Vec<Value>) -> Self {
        Self::new(BroadcastKind::Created, collection, data)
    }

    pub fn updated(collection: impl Into<String>, data: Vec<Value>) -> Self {
        Self::new(BroadcastKind::Updated, collection, data)
    }

    pub fn deleted_one(collection: impl Into<String>, data: Vec<Value>) -> Self {
        Self::new(BroadcastKind::DeletedOne, collection, data)
    }

    pub fn deleted_all(collection: impl Into<String>) -> Self {
        Self::new(BroadcastKind::DeletedAll, collection, Vec::new())
    }
}

/// Events the Channel delivers to registered handlers.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    /// The underlying connection was (re)established
    Connect,
    Broadcast(Broadcast),
}

impl InboundEvent {
    pub fn kind(&self) -> InboundKind {
        match self {
            Self::Connect => InboundKind::Connect,
            Self::Broadcast(_) => InboundKind::Broadcast,
        }
    }
}

/// Address under which a handler is registered with [`Channel::on`](crate::Channel::on).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboundKind {
    Connect,
    Broadcast,
}
