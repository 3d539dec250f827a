//! # Refresh coalescing
//!
//! Each collection runs at most one full refresh at a time. Requests that
//! arrive while one is in flight collapse into a single queued refresh,
//! which is issued after the in-flight one completes and a quiescence delay
//! has passed. Outbound refresh traffic is therefore bounded to one
//! in-flight request plus one trailing request, however large the burst.
//!
//! | state         | event          | next state    | action             |
//! |---------------|----------------|---------------|--------------------|
//! | Idle          | Requested      | Refreshing    | Issue              |
//! | Refreshing    | Requested      | RefreshQueued | None               |
//! | RefreshQueued | Requested      | RefreshQueued | None               |
//! | Refreshing    | Completed      | Idle          | None               |
//! | RefreshQueued | Completed      | Refreshing    | ScheduleTrailing   |
//! | Refreshing    | DelayElapsed   | Refreshing    | Issue              |
//! | RefreshQueued | DelayElapsed   | Refreshing    | Issue              |
//! | Idle          | Completed / DelayElapsed | Idle | None             |
//!
//! `DelayElapsed` only occurs after `ScheduleTrailing`, so in the two
//! `DelayElapsed` rows nothing is in flight when the trailing request goes
//! out. A request queued during the delay is honored by that trailing
//! request, which is why the queued mark is cleared when it is issued.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
    RefreshQueued,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshEvent {
    /// A consumer or reconciliation path asked for a full refresh
    Requested,
    /// The in-flight refresh was acknowledged, successfully or not
    Completed,
    /// The quiescence delay of a scheduled trailing refresh has passed
    DelayElapsed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshAction {
    None,
    /// Emit a refresh request now
    Issue,
    /// Arm the quiescence timer, then deliver `DelayElapsed`
    ScheduleTrailing,
}

impl RefreshState {
    pub fn transition(self, event: RefreshEvent) -> (Self, RefreshAction) {
        match (self, event) {
            (Self::Idle, RefreshEvent::Requested) => (Self::Refreshing, RefreshAction::Issue),
            (Self::Refreshing | Self::RefreshQueued, RefreshEvent::Requested) => {
                (Self::RefreshQueued, RefreshAction::None)
            }
            (Self::Refreshing, RefreshEvent::Completed) => (Self::Idle, RefreshAction::None),
            (Self::RefreshQueued, RefreshEvent::Completed) => {
                (Self::Refreshing, RefreshAction::ScheduleTrailing)
            }
            (Self::Refreshing | Self::RefreshQueued, RefreshEvent::DelayElapsed) => {
                (Self::Refreshing, RefreshAction::Issue)
            }
            (Self::Idle, RefreshEvent::Completed | RefreshEvent::DelayElapsed) => {
                (Self::Idle, RefreshAction::None)
            }
        }
    }
}

/// Deadline of a scheduled trailing refresh.
#[derive(Clone, Debug, Default)]
pub struct RefreshTimer {
    deadline: Option<Instant>,
}

impl RefreshTimer {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    pub fn arm(&mut self, from: Instant, delay: Duration) {
        self.deadline = Some(from + delay);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarms and returns true if the deadline has passed at `now`.
    pub fn take_if_ringing(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
