//! # Replica Client
//! A client-side mirror of server-held collections. Consumers read and write
//! through a local cache; the cache issues requests over a [`Channel`],
//! reconciles server broadcasts into its own state, and notifies observers
//! after every observable mutation.
//!
//! [`Channel`]: replica_shared::Channel

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use replica_shared::{
    Broadcast, BroadcastKind, Channel, Fields, InboundEvent, InboundKind, RecordId, RemoteError,
    Request,
};

mod client;
mod client_config;
mod collection;
mod context;
mod entity;
mod error;
mod notifier;

pub use client::Client;
pub use client_config::ClientConfig;
pub use collection::{
    refresh::{RefreshAction, RefreshEvent, RefreshState, RefreshTimer},
    CollectionCache,
};
pub use context::Callback;
pub use entity::EntityProxy;
pub use error::{ClientError, ValidationError};
pub use notifier::{Change, ChangeCause, ChangeNotifier, SubscriptionId};
