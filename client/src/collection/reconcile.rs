//! Applies broadcasts to a collection's storage.
//!
//! Broadcasts for other collections are ignored. Every applied broadcast
//! ends with a notification, even when nothing in storage changed.

use std::mem;

use log::{debug, trace, warn};
use serde_json::Value;

use replica_shared::{fields_id, record_id, Broadcast, BroadcastKind, RecordId};

use crate::{collection::CollectionCache, notifier::ChangeCause};

impl CollectionCache {
    pub(crate) fn reconcile(&self, broadcast: &Broadcast) {
        if broadcast.collection != self.name() {
            trace!(
                "{}: ignoring {} for {}",
                self.name(),
                broadcast.kind,
                broadcast.collection
            );
            return;
        }
        debug!(
            "{}: reconciling {} ({} items)",
            self.name(),
            broadcast.kind,
            broadcast.data.len()
        );

        match broadcast.kind {
            BroadcastKind::Created => self.reconcile_created(&broadcast.data),
            BroadcastKind::Updated => self.reconcile_updated(&broadcast.data),
            BroadcastKind::DeletedOne => self.reconcile_deleted_one(&broadcast.data),
            BroadcastKind::DeletedAll => self.reconcile_deleted_all(),
        }

        self.inner
            .context
            .notify(ChangeCause::Reconciled(broadcast.kind));

        if broadcast.kind == BroadcastKind::DeletedAll && self.inner.refresh_on_delete_all {
            self.request_refresh(None);
        }
    }

    /// Fetches every announced record that is neither stored nor already
    /// being fetched.
    fn reconcile_created(&self, data: &[Value]) {
        for id in self.ids_of(data, BroadcastKind::Created) {
            let known = {
                let state = self.inner.state.borrow();
                state.position(&id).is_some() || state.pending_fetches.contains(&id)
            };
            if known {
                trace!("{}: {} already known, not fetching", self.name(), id);
                continue;
            }
            self.fetch_one(id, None);
        }
    }

    /// Applies confirmed values to stored entities. Records that are not
    /// stored are not added.
    fn reconcile_updated(&self, data: &[Value]) {
        for record in data {
            let Value::Object(fields) = record else {
                warn!("{}: updated broadcast carried a non-object entry", self.name());
                continue;
            };
            let Some(id) = fields_id(fields, &self.inner.context.id_field) else {
                warn!("{}: updated broadcast entry has no ID", self.name());
                continue;
            };
            match self.show(id) {
                Some(entity) => entity.set(fields),
                None => trace!("{}: update for an entity not stored", self.name()),
            }
        }
    }

    /// Removes the first stored entity matching each identifier. Unknown
    /// identifiers are a no-op.
    fn reconcile_deleted_one(&self, data: &[Value]) {
        for id in self.ids_of(data, BroadcastKind::DeletedOne) {
            let mut state = self.inner.state.borrow_mut();
            if let Some(index) = state.position(&id) {
                state.storage.remove(index);
            }
        }
    }

    fn reconcile_deleted_all(&self) {
        let removed = mem::take(&mut self.inner.state.borrow_mut().storage);
        debug!("{}: cleared {} entities", self.name(), removed.len());
    }

    fn ids_of(&self, data: &[Value], kind: BroadcastKind) -> Vec<RecordId> {
        data.iter()
            .filter_map(|item| {
                let id = record_id(item, &self.inner.context.id_field);
                if id.is_none() {
                    warn!("{}: {} broadcast entry has no ID", self.name(), kind);
                }
                id
            })
            .collect()
    }
}
