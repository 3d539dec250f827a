use std::{cell::RefCell, collections::HashMap, rc::Rc, time::Instant};

use log::info;

use replica_shared::Channel;

use crate::{
    client_config::ClientConfig,
    collection::CollectionCache,
    notifier::{Change, ChangeNotifier, SubscriptionId},
};

/// Produces named [`CollectionCache`]s that share one Channel and one
/// [`ChangeNotifier`].
pub struct Client {
    channel: Rc<dyn Channel>,
    config: ClientConfig,
    notifier: ChangeNotifier,
    collections: RefCell<HashMap<String, CollectionCache>>,
}

impl Client {
    /// Wraps an opened Channel. Nothing is emitted until the first
    /// collection is requested.
    pub fn new(channel: Rc<dyn Channel>, config: ClientConfig) -> Self {
        Self {
            channel,
            config,
            notifier: ChangeNotifier::new(),
            collections: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the collection named `name`, creating it on first use.
    ///
    /// Creation subscribes the collection to connection and broadcast
    /// events and issues its initial refresh. The collection is registered
    /// before that refresh goes out, so an observer may look it up again
    /// from inside a synchronous ack. Later calls with the same name return
    /// a handle to the same collection.
    ///
    /// Every connection event is reported to observers as
    /// [`ChangeCause::Connected`](crate::ChangeCause::Connected), once per
    /// collection.
    pub fn collection(&self, name: &str) -> CollectionCache {
        if let Some(collection) = self.collections.borrow().get(name) {
            return collection.clone();
        }

        info!("opening collection {}", name);
        let collection = CollectionCache::new(
            name,
            self.channel.clone(),
            self.notifier.clone(),
            &self.config,
        );
        self.collections
            .borrow_mut()
            .insert(name.to_string(), collection.clone());
        collection.start();
        collection
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registers an observer, called after every observable mutation of any
    /// collection or entity of this Client.
    pub fn subscribe(&self, observer: impl Fn(&Change) + 'static) -> SubscriptionId {
        self.notifier.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Drives time-based work: issues every trailing refresh whose delay
    /// has passed at `now`. Call this from the application's event loop
    /// with `Instant::now()`; deadlines are armed from that same clock.
    pub fn tick(&self, now: Instant) {
        let collections: Vec<CollectionCache> =
            self.collections.borrow().values().cloned().collect();
        for collection in collections {
            collection.tick(now);
        }
    }
}
