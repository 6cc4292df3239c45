//! Handle Audit Trail
//!
//! Records every handle lifecycle event in the simulated kernel so tests can
//! assert ownership properties: a handle closed exactly once, nothing
//! leaked after teardown, bundles transferred whole.
//!
//! ## Example
//!
//! ```
//! use sim_kernel::handle_audit::{HandleAuditLog, HandleEvent};
//! use kernel_api::Instant;
//!
//! let mut log = HandleAuditLog::new();
//! log.record_event(Instant::from_nanos(0), HandleEvent::Closed { handle: 0x101 });
//! assert_eq!(log.close_count(0x101), 1);
//! ```

use core_types::RawHandle;
use kernel_api::Instant;

/// A handle lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleEvent {
    /// A new handle value was minted for a fresh object
    Created { handle: RawHandle, kind: &'static str },
    /// A second handle was minted for an existing object
    Duplicated { from: RawHandle, to: RawHandle },
    Closed { handle: RawHandle },
    /// The handle left its owner inside a message or bundle
    Transferred { handle: RawHandle },
    /// A transferred object was re-minted under a new value
    Received { handle: RawHandle },
    /// A close was refused by the fault plan
    CloseFailed { handle: RawHandle },
    ProcessStarted { name: String, handle_count: usize },
}

/// A single audit event with timestamp
#[derive(Debug, Clone)]
pub struct HandleAuditEvent {
    pub timestamp: Instant,
    pub event: HandleEvent,
}

/// Chronological log of handle events
#[derive(Debug, Default)]
pub struct HandleAuditLog {
    events: Vec<HandleAuditEvent>,
}

impl HandleAuditLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record_event(&mut self, timestamp: Instant, event: HandleEvent) {
        self.events.push(HandleAuditEvent { timestamp, event });
    }

    pub fn get_events(&self) -> &[HandleAuditEvent] {
        &self.events
    }

    /// Counts events matching the predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&HandleEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(&e.event)).count()
    }

    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&HandleEvent) -> bool,
    {
        self.events.iter().any(|e| predicate(&e.event))
    }

    /// Number of successful closes of `handle`
    pub fn close_count(&self, handle: RawHandle) -> usize {
        self.count_events(|e| matches!(e, HandleEvent::Closed { handle: h } if *h == handle))
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
