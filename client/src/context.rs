use std::rc::Rc;

use log::{trace, warn};
use serde_json::Value;

use replica_shared::{Channel, Request};

use crate::{
    error::ClientError,
    notifier::{ChangeCause, ChangeNotifier},
};

/// Delivered once with the settled result of a request.
pub type Callback<T> = Box<dyn FnOnce(Result<T, ClientError>)>;

/// Everything a collection and its entities need to talk to the server:
/// the Channel, the Client's notifier, the collection scope and the
/// identifier field.
pub(crate) struct RequestContext {
    pub(crate) channel: Rc<dyn Channel>,
    pub(crate) notifier: ChangeNotifier,
    pub(crate) collection: String,
    pub(crate) id_field: String,
}

impl RequestContext {
    pub(crate) fn new(
        channel: Rc<dyn Channel>,
        notifier: ChangeNotifier,
        collection: &str,
        id_field: &str,
    ) -> Self {
        Self {
            channel,
            notifier,
            collection: collection.to_string(),
            id_field: id_field.to_string(),
        }
    }

    pub(crate) fn notify(&self, cause: ChangeCause) {
        self.notifier.notify(&self.collection, cause);
    }

    /// Emits `request` and hands the ack to `on_ack`, mapping a remote error
    /// to [`ClientError::OperationFailed`].
    pub(crate) fn emit(
        &self,
        request: Request,
        on_ack: impl FnOnce(Result<Value, ClientError>) + 'static,
    ) {
        let operation = request.event_name();
        trace!("emit {}", request.log());
        self.channel.emit(
            request,
            Box::new(move |result| {
                on_ack(result.map_err(|error| {
                    warn!("{} was rejected by the server: {}", operation, error);
                    ClientError::operation_failed(operation, error)
                }))
            }),
        );
    }

    /// Emits `request` whose ack payload is passed through untouched. The
    /// callback runs first, then observers are notified with `cause`, or
    /// with [`ChangeCause::Failed`] if the server reported an error.
    pub(crate) fn emit_settled(
        self: &Rc<Self>,
        request: Request,
        cause: ChangeCause,
        callback: Option<Callback<Value>>,
    ) {
        let context = Rc::clone(self);
        self.emit(request, move |result| {
            let settled_cause = if result.is_ok() {
                cause
            } else {
                ChangeCause::Failed
            };
            if let Some(callback) = callback {
                callback(result);
            }
            context.notify(settled_cause);
        });
    }
}
