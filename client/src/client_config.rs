use std::{default::Default, time::Duration};

use replica_shared::DEFAULT_ID_FIELD;

/// Contains Config properties which will be used by a Client and every
/// CollectionCache it creates
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Quiescence delay between a completed refresh and the trailing refresh
    /// that honors requests coalesced while it was in flight
    pub refresh_delay: Duration,
    /// Field under which records carry their server-assigned identifier
    pub id_field: String,
    /// Whether every connection-established event triggers a full refresh
    pub refresh_on_connect: bool,
    /// Whether a `deletedAll` broadcast is followed by a full refresh once
    /// local storage has been cleared
    pub refresh_on_delete_all: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            refresh_delay: Duration::from_secs(1),
            id_field: DEFAULT_ID_FIELD.to_string(),
            refresh_on_connect: true,
            refresh_on_delete_all: true,
        }
    }
}
