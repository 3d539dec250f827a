use std::{
    cell::RefCell,
    collections::HashSet,
    mem,
    rc::{Rc, Weak},
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use serde_json::Value;

use replica_shared::{fields_id, Channel, Fields, InboundEvent, InboundKind, RecordId, Request};

use crate::{
    client_config::ClientConfig,
    collection::refresh::{RefreshAction, RefreshEvent, RefreshState, RefreshTimer},
    context::{Callback, RequestContext},
    entity::EntityProxy,
    error::{ClientError, ValidationError},
    notifier::{ChangeCause, ChangeNotifier},
};

pub(crate) struct CollectionState {
    /// Server order; no two entries share an identifier
    pub(crate) storage: Vec<EntityProxy>,
    pub(crate) refresh: RefreshState,
    pub(crate) timer: RefreshTimer,
    /// Waiting on the refresh currently in flight
    pub(crate) in_flight_waiters: Vec<Callback<Vec<EntityProxy>>>,
    /// Waiting on the next refresh to be issued
    pub(crate) queued_waiters: Vec<Callback<Vec<EntityProxy>>>,
    /// Identifiers with a `retrieveOne` in flight
    pub(crate) pending_fetches: HashSet<RecordId>,
}

impl CollectionState {
    fn new() -> Self {
        Self {
            storage: Vec::new(),
            refresh: RefreshState::Idle,
            timer: RefreshTimer::new(),
            in_flight_waiters: Vec::new(),
            queued_waiters: Vec::new(),
            pending_fetches: HashSet::new(),
        }
    }

    pub(crate) fn position(&self, id: &RecordId) -> Option<usize> {
        self.storage
            .iter()
            .position(|entity| entity.id() == Some(id))
    }
}

pub(crate) struct CollectionInner {
    pub(crate) context: Rc<RequestContext>,
    pub(crate) refresh_delay: Duration,
    pub(crate) refresh_on_connect: bool,
    pub(crate) refresh_on_delete_all: bool,
    pub(crate) state: RefCell<CollectionState>,
}

/// Local view of one named collection.
///
/// Owns the ordered entity list, issues requests on the Channel and
/// reconciles acks and broadcasts back into the list. Cloning yields another
/// handle to the same collection.
#[derive(Clone)]
pub struct CollectionCache {
    pub(crate) inner: Rc<CollectionInner>,
}

impl CollectionCache {
    /// Creates the collection and subscribes it to connection and broadcast
    /// events. Nothing is emitted until [`CollectionCache::start`].
    pub(crate) fn new(
        name: &str,
        channel: Rc<dyn Channel>,
        notifier: ChangeNotifier,
        config: &ClientConfig,
    ) -> Self {
        let collection = Self {
            inner: Rc::new(CollectionInner {
                context: Rc::new(RequestContext::new(
                    channel.clone(),
                    notifier,
                    name,
                    &config.id_field,
                )),
                refresh_delay: config.refresh_delay,
                refresh_on_connect: config.refresh_on_connect,
                refresh_on_delete_all: config.refresh_on_delete_all,
                state: RefCell::new(CollectionState::new()),
            }),
        };

        let weak = Rc::downgrade(&collection.inner);
        channel.on(
            InboundKind::Connect,
            Rc::new(move |event| Self::dispatch(&weak, event)),
        );
        let weak = Rc::downgrade(&collection.inner);
        channel.on(
            InboundKind::Broadcast,
            Rc::new(move |event| Self::dispatch(&weak, event)),
        );

        collection
    }

    /// Issues the initial full refresh. The owner must be able to hand out
    /// this collection before calling it, since a Channel may ack inside
    /// `emit` and observers may look the collection up again.
    pub(crate) fn start(&self) {
        self.request_refresh(None);
    }

    fn dispatch(weak: &Weak<CollectionInner>, event: &InboundEvent) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let collection = Self { inner };
        match event {
            InboundEvent::Connect => {
                if collection.inner.refresh_on_connect {
                    info!("{}: connected, refreshing", collection.name());
                    collection.request_refresh(None);
                }
                collection.inner.context.notify(ChangeCause::Connected);
            }
            InboundEvent::Broadcast(broadcast) => collection.reconcile(broadcast),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.context.collection
    }

    /// Current entities in server order. No network call; the handles are
    /// shared with storage, so later confirmed writes show through them.
    pub fn list(&self) -> Vec<EntityProxy> {
        self.inner.state.borrow().storage.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().storage.is_empty()
    }

    /// Linear scan for the entity with identifier `id`.
    pub fn show(&self, id: impl Into<RecordId>) -> Option<EntityProxy> {
        let id = id.into();
        let state = self.inner.state.borrow();
        state
            .position(&id)
            .map(|index| state.storage[index].clone())
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.inner.state.borrow().refresh
    }

    /// Deadline of the scheduled trailing refresh, if any.
    pub fn trailing_refresh_at(&self) -> Option<Instant> {
        self.inner.state.borrow().timer.deadline()
    }

    /// Requests the full collection and replaces storage with it.
    ///
    /// If a refresh is already in flight this call is coalesced: at most one
    /// trailing refresh follows it, issued once the in-flight one completes
    /// and the refresh delay has passed (see [`CollectionCache::tick`]).
    /// `callback` receives the result of the first refresh issued after
    /// this call.
    pub fn retrieve_all<F>(&self, callback: F)
    where
        F: FnOnce(Result<Vec<EntityProxy>, ClientError>) + 'static,
    {
        self.request_refresh(Some(Box::new(callback)));
    }

    /// Issues the trailing refresh if its delay has passed at `now`.
    ///
    /// The trailing deadline is armed from `Instant::now()` when the
    /// in-flight refresh completes, so `now` must come from the same
    /// monotonic clock, normally `Instant::now()` in the event loop.
    pub fn tick(&self, now: Instant) {
        let ringing = self.inner.state.borrow_mut().timer.take_if_ringing(now);
        if ringing {
            self.step_refresh(RefreshEvent::DelayElapsed);
        }
    }

    /// Fetches one record and stores it. If an entity with the same
    /// identifier is already stored, its values are replaced in place
    /// instead of appending a second copy.
    pub fn retrieve_one<F>(&self, id: impl Into<RecordId>, callback: F) -> Result<(), ClientError>
    where
        F: FnOnce(Result<EntityProxy, ClientError>) + 'static,
    {
        let id = id.into();
        if id.as_str().is_empty() {
            return Err(ValidationError::MissingId.into());
        }
        self.fetch_one(id, Some(Box::new(callback)));
        Ok(())
    }

    /// Requests creation of a record. The new entity enters storage through
    /// the `created` broadcast, like entities created by any other client.
    pub fn create<F>(&self, fields: Value, callback: F) -> Result<(), ClientError>
    where
        F: FnOnce(Result<Value, ClientError>) + 'static,
    {
        if !fields.is_object() {
            return Err(ValidationError::MissingFields {
                operation: "create",
            }
            .into());
        }
        self.inner.context.emit_settled(
            Request::Create {
                collection: self.name().to_string(),
                fields,
            },
            ChangeCause::Created,
            Some(Box::new(callback)),
        );
        Ok(())
    }

    /// Requests a bulk update of every record matching `filter`. Local
    /// values change when the `updated` broadcast is reconciled.
    pub fn update<F>(&self, filter: Value, fields: Value, callback: F) -> Result<(), ClientError>
    where
        F: FnOnce(Result<Value, ClientError>) + 'static,
    {
        if !filter.is_object() {
            return Err(ValidationError::MissingFilter.into());
        }
        if !fields.is_object() {
            return Err(ValidationError::MissingFields {
                operation: "update",
            }
            .into());
        }
        self.inner.context.emit_settled(
            Request::Update {
                collection: self.name().to_string(),
                filter,
                fields,
            },
            ChangeCause::Updated,
            Some(Box::new(callback)),
        );
        Ok(())
    }

    /// Requests deletion of every record. Storage is cleared when the
    /// `deletedAll` broadcast is reconciled.
    pub fn delete_all<F>(&self, callback: F)
    where
        F: FnOnce(Result<Value, ClientError>) + 'static,
    {
        self.inner.context.emit_settled(
            Request::DeleteAll {
                collection: self.name().to_string(),
            },
            ChangeCause::DeletedAll,
            Some(Box::new(callback)),
        );
    }

    // Refresh

    pub(crate) fn request_refresh(&self, callback: Option<Callback<Vec<EntityProxy>>>) {
        let action = {
            let mut state = self.inner.state.borrow_mut();
            let (next, action) = state.refresh.transition(RefreshEvent::Requested);
            state.refresh = next;
            if let Some(callback) = callback {
                state.queued_waiters.push(callback);
            }
            action
        };
        if action == RefreshAction::None {
            debug!("{}: refresh already in flight, queued", self.name());
        }
        self.run_refresh_action(action);
    }

    fn step_refresh(&self, event: RefreshEvent) {
        let action = {
            let mut state = self.inner.state.borrow_mut();
            let (next, action) = state.refresh.transition(event);
            state.refresh = next;
            action
        };
        self.run_refresh_action(action);
    }

    fn run_refresh_action(&self, action: RefreshAction) {
        match action {
            RefreshAction::None => {}
            RefreshAction::Issue => self.issue_refresh(),
            RefreshAction::ScheduleTrailing => {
                debug!(
                    "{}: trailing refresh in {:?}",
                    self.name(),
                    self.inner.refresh_delay
                );
                self.inner
                    .state
                    .borrow_mut()
                    .timer
                    .arm(Instant::now(), self.inner.refresh_delay);
            }
        }
    }

    fn issue_refresh(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            let queued = mem::take(&mut state.queued_waiters);
            state.in_flight_waiters.extend(queued);
        }
        info!("{}: refreshing", self.name());

        let collection = self.clone();
        self.inner.context.emit(
            Request::RetrieveAll {
                collection: self.name().to_string(),
            },
            move |result| collection.complete_refresh(result),
        );
    }

    fn complete_refresh(&self, result: Result<Value, ClientError>) {
        let outcome = result.and_then(|data| self.replace_storage(data));
        let waiters = mem::take(&mut self.inner.state.borrow_mut().in_flight_waiters);
        self.step_refresh(RefreshEvent::Completed);

        let cause = match &outcome {
            Ok(_) => ChangeCause::Refreshed,
            Err(error) => {
                warn!("{}: refresh failed: {}", self.name(), error);
                ChangeCause::Failed
            }
        };
        for waiter in waiters {
            waiter(outcome.clone());
        }
        self.inner.context.notify(cause);
    }

    /// Makes storage equal the server's sequence. Entities that survive keep
    /// their handle and take the server's values; the rest are dropped.
    fn replace_storage(&self, data: Value) -> Result<Vec<EntityProxy>, ClientError> {
        let Value::Array(records) = data else {
            return Err(ClientError::malformed(
                "retrieveAll",
                "expected an array of records",
            ));
        };

        let id_field = &self.inner.context.id_field;
        let mut state = self.inner.state.borrow_mut();
        let mut previous = mem::take(&mut state.storage);
        let mut seen = HashSet::new();
        let mut storage = Vec::with_capacity(records.len());

        for record in records {
            let Value::Object(fields) = record else {
                warn!("{}: skipping non-object record in refresh", self.name());
                continue;
            };
            let id = fields_id(&fields, id_field);
            let entity = match &id {
                Some(id) => {
                    if !seen.insert(id.clone()) {
                        warn!("{}: refresh returned {} twice, keeping the first", self.name(), id);
                        continue;
                    }
                    match previous.iter().position(|entity| entity.id() == Some(id)) {
                        Some(index) => {
                            let entity = previous.swap_remove(index);
                            entity.replace(fields);
                            entity
                        }
                        None => self.new_entity(fields),
                    }
                }
                None => self.new_entity(fields),
            };
            storage.push(entity);
        }

        debug!(
            "{}: refreshed {} entities ({} dropped)",
            self.name(),
            storage.len(),
            previous.len()
        );
        state.storage = storage.clone();
        Ok(storage)
    }

    // Single record

    pub(crate) fn fetch_one(&self, id: RecordId, callback: Option<Callback<EntityProxy>>) {
        self.inner
            .state
            .borrow_mut()
            .pending_fetches
            .insert(id.clone());

        let collection = self.clone();
        let requested = id.clone();
        self.inner.context.emit(
            Request::RetrieveOne {
                collection: self.name().to_string(),
                id,
            },
            move |result| {
                collection
                    .inner
                    .state
                    .borrow_mut()
                    .pending_fetches
                    .remove(&requested);

                let outcome = result.and_then(|data| collection.store_one(data));
                let cause = match &outcome {
                    Ok(_) => ChangeCause::Retrieved,
                    Err(_) => ChangeCause::Failed,
                };
                if let Some(callback) = callback {
                    callback(outcome);
                }
                collection.inner.context.notify(cause);
            },
        );
    }

    fn store_one(&self, data: Value) -> Result<EntityProxy, ClientError> {
        let Value::Object(fields) = data else {
            return Err(ClientError::malformed("retrieveOne", "expected a record object"));
        };

        let id = fields_id(&fields, &self.inner.context.id_field);
        let existing = id.as_ref().and_then(|id| self.show(id.clone()));
        if let Some(entity) = existing {
            debug!("{}: {:?} already stored, replacing values", self.name(), entity.id());
            entity.replace(fields);
            return Ok(entity);
        }

        let entity = self.new_entity(fields);
        self.inner.state.borrow_mut().storage.push(entity.clone());
        Ok(entity)
    }

    pub(crate) fn new_entity(&self, fields: Fields) -> EntityProxy {
        EntityProxy::new(fields, Rc::clone(&self.inner.context))
    }
}
