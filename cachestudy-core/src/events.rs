//! Time-ordered event queue for the simulation engine.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::backend::RequestId;
use crate::clock::SimTime;
use crate::resource::{Target, Ticket};
use crate::store::Key;

/// Something that will happen at a point in simulated time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    /// A new client request enters the system. `None` draws a key from
    /// the workload; `Some` is an injected probe for a fixed key.
    Arrival { key: Option<Key> },
    /// A queued admission attempt has waited longer than the resource's
    /// admission timeout.
    AdmissionExpired {
        request: RequestId,
        target: Target,
        ticket: Ticket,
    },
    /// An admitted operation finishes holding its slot.
    ServiceComplete { request: RequestId, target: Target },
    /// A scheduled bulk invalidation of the cache store.
    Invalidation { fraction: f64 },
}

/// An event bound to its firing time.
///
/// Ordered by timestamp, then by scheduling sequence, so that events
/// scheduled earlier fire earlier when timestamps tie.
#[derive(Debug, Clone)]
pub(crate) struct ScheduledEvent {
    pub at: SimTime,
    seq: u64,
    pub event: Event,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we need earliest-first.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending events with FIFO tie-breaking.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `event` to fire at `at`.
    pub fn push(&mut self, at: SimTime, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledEvent { at, seq, event });
    }

    /// Removes and returns the earliest pending event.
    pub fn pop(&mut self) -> Option<ScheduledEvent> {
        self.heap.pop()
    }

    /// Returns the firing time of the earliest pending event.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
