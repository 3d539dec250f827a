/// In-memory Channel for E2E testing
/// Queues requests until a test (or a TestServer) acknowledges them, and
/// delivers inbound events to registered handlers on demand

use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
};

use replica_shared::{
    AckFn, AckResult, Broadcast, Channel, EventHandler, InboundEvent, InboundKind, Request,
};

/// Answers a request on the spot, for channels that ack inside `emit`
pub type Responder = Rc<dyn Fn(&Request) -> AckResult>;

struct LocalChannelInner {
    pending: RefCell<VecDeque<(Request, AckFn)>>,
    sent: RefCell<Vec<Request>>,
    handlers: RefCell<Vec<(InboundKind, EventHandler)>>,
    responder: Option<Responder>,
}

/// Cloning yields another handle to the same channel, so a test can keep
/// one while the Client owns another.
#[derive(Clone)]
pub struct LocalChannel {
    inner: Rc<LocalChannelInner>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::with_responder(None)
    }

    /// Channel that acknowledges every request before `emit` returns, with
    /// the result `responder` computes. Nothing is ever left pending.
    pub fn synchronous(responder: impl Fn(&Request) -> AckResult + 'static) -> Self {
        Self::with_responder(Some(Rc::new(responder)))
    }

    fn with_responder(responder: Option<Responder>) -> Self {
        Self {
            inner: Rc::new(LocalChannelInner {
                pending: RefCell::new(VecDeque::new()),
                sent: RefCell::new(Vec::new()),
                handlers: RefCell::new(Vec::new()),
                responder,
            }),
        }
    }

    /// Handle to pass to `Client::new`.
    pub fn as_channel(&self) -> Rc<dyn Channel> {
        Rc::new(self.clone())
    }

    /// Every request emitted so far, in order, acknowledged or not.
    pub fn sent(&self) -> Vec<Request> {
        self.inner.sent.borrow().clone()
    }

    pub fn sent_count(&self, event_name: &str) -> usize {
        self.inner
            .sent
            .borrow()
            .iter()
            .filter(|request| request.event_name() == event_name)
            .count()
    }

    pub fn clear_sent(&self) {
        self.inner.sent.borrow_mut().clear();
    }

    /// Requests still waiting for an ack, oldest first.
    pub fn pending(&self) -> Vec<Request> {
        self.inner
            .pending
            .borrow()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn pending_count_of(&self, event_name: &str) -> usize {
        self.inner
            .pending
            .borrow()
            .iter()
            .filter(|(request, _)| request.event_name() == event_name)
            .count()
    }

    /// Removes the oldest pending request without acknowledging it.
    pub fn pop_pending(&self) -> Option<(Request, AckFn)> {
        self.inner.pending.borrow_mut().pop_front()
    }

    /// Acknowledges the oldest pending request with `result`.
    pub fn ack_next(&self, result: AckResult) -> Option<Request> {
        let (request, ack) = self.pop_pending()?;
        ack(result);
        Some(request)
    }

    /// Acknowledges the oldest pending request emitted under `event_name`.
    pub fn ack_next_of(&self, event_name: &str, result: AckResult) -> Option<Request> {
        let (request, ack) = {
            let mut pending = self.inner.pending.borrow_mut();
            let index = pending
                .iter()
                .position(|(request, _)| request.event_name() == event_name)?;
            pending.remove(index)?
        };
        ack(result);
        Some(request)
    }

    /// Drops the oldest pending request so its ack never arrives.
    pub fn lose_next(&self) -> Option<Request> {
        self.pop_pending().map(|(request, _)| request)
    }

    pub fn connect(&self) {
        self.deliver(InboundEvent::Connect);
    }

    pub fn broadcast(&self, broadcast: Broadcast) {
        self.deliver(InboundEvent::Broadcast(broadcast));
    }

    /// Calls every handler registered for the event's kind. The handler list
    /// is snapshotted first, so handlers may register more handlers.
    pub fn deliver(&self, event: InboundEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .inner
            .handlers
            .borrow()
            .iter()
            .filter(|(handler_kind, _)| *handler_kind == kind)
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn handler_count(&self, kind: InboundKind) -> usize {
        self.inner
            .handlers
            .borrow()
            .iter()
            .filter(|(handler_kind, _)| *handler_kind == kind)
            .count()
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for LocalChannel {
    fn emit(&self, request: Request, ack: AckFn) {
        self.inner.sent.borrow_mut().push(request.clone());
        match &self.inner.responder {
            Some(responder) => ack(responder(&request)),
            None => self.inner.pending.borrow_mut().push_back((request, ack)),
        }
    }

    fn on(&self, kind: InboundKind, handler: EventHandler) {
        self.inner.handlers.borrow_mut().push((kind, handler));
    }
}
