//! # Outbox Queue
//!
//! Ordered queue of events the server hasn't acknowledged yet.
//!
//! ```text
//!   enqueue ──► [ e1 e2 e3 ... e50 | e51 e52 ... ] ──► take_batch(50)
//!                 └──── first batch ───┘
//!
//!   response: acknowledged {e1,e2}, rejected {e3}
//!   remove_ids ──► [ e4 ... e50 e51 e52 ... ]   (order kept)
//! ```
//!
//! Removal is always by id. Events enqueued while a push is in flight
//! stay where they are.

use std::collections::HashSet;
use till_core::Event;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbox {
    events: Vec<Event>,
}

impl Outbox {
    pub fn from_events(events: Vec<Event>) -> Self {
        Outbox { events }
    }

    /// Appends at the back (lowest priority).
    pub fn push_back(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Copies the first `size` events in transmission order.
    pub fn take_batch(&self, size: usize) -> Vec<Event> {
        self.events.iter().take(size).cloned().collect()
    }

    /// Drops every event whose id is in `ids`. Returns how many were removed.
    pub fn remove_ids(&mut self, ids: &HashSet<&str>) -> usize {
        let before = self.events.len();
        self.events.retain(|e| !ids.contains(e.event_id.as_str()));
        before - self.events.len()
    }

    /// Drops a single event by id.
    pub fn remove(&mut self, event_id: &str) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.event_id != event_id);
        before != self.events.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}
