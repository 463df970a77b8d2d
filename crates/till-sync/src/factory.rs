//! # Event Factory
//!
//! Turns a `(event_type, payload)` pair from a business page into a
//! well-formed outbox event.
//!
//! ```text
//!   event_type ──► validate_event_type
//!   context    ──► bind()  ── missing device/branch/user? ──► Err (nothing persisted)
//!   payload    ──► stamp branch_id / device_id / user_id / shift_summary
//!                       │
//!                       ▼
//!              Event { fresh event_id, created_at = now }
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

use till_core::validation::validate_event_type;
use till_core::{Event, Payload, RuntimeContext};

use crate::error::SyncResult;

/// Builds an event for the current context. Pure: no persistence.
pub fn build_event(
    context: &RuntimeContext,
    event_type: &str,
    payload: Payload,
    now: DateTime<Utc>,
) -> SyncResult<Event> {
    let bound = context.bind()?;
    validate_event_type(event_type)?;

    let event = Event::new(event_type, bound.stamp(payload), now);
    debug!(
        event_id = %event.event_id,
        event_type = %event.event_type,
        "Built outbox event"
    );
    Ok(event)
}
