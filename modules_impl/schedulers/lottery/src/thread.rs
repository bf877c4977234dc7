//! # Weighted Thread State
//!
//! Per-thread scheduling record: base tickets, the memoized effective
//! weight, the resource queues this thread holds and its join queue.
//!
//! Only aggregate weight is tracked. Ticket counts can reach billions, so
//! nothing here is per-ticket.

use alloc::vec::Vec;
use core::fmt;

use crate::config::{in_range, PRIORITY_DEFAULT, PRIORITY_MAXIMUM, PRIORITY_MINIMUM};
use crate::error::{SchedError, SchedResult};
use crate::queue::QueueId;

/// Ticket count type
pub type Tickets = u32;

// =============================================================================
// Thread Identity
// =============================================================================

/// Stable thread identity, supplied by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u64);

impl ThreadId {
    /// Wrap a runtime thread identifier
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// =============================================================================
// Effective Weight Cache
// =============================================================================

/// Memoized effective weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveWeight {
    /// Computed from the current donation graph
    Fresh(u64),
    /// Must be recomputed on next query
    Expired,
}

impl EffectiveWeight {
    /// Cached value, if still valid
    #[inline]
    pub fn get(self) -> Option<u64> {
        match self {
            EffectiveWeight::Fresh(weight) => Some(weight),
            EffectiveWeight::Expired => None,
        }
    }
}

// =============================================================================
// Thread State
// =============================================================================

/// Scheduling state attached to one thread
#[derive(Debug, Clone)]
pub struct ThreadState {
    id: ThreadId,
    base: Tickets,
    effective: EffectiveWeight,
    /// Resource queues this thread holds, in acquisition order
    held: Vec<QueueId>,
    /// Threads waiting for this one to finish; allocated on first join
    join_queue: Option<QueueId>,
    /// Queue this thread is blocked in, if any
    waiting_in: Option<QueueId>,
}

impl ThreadState {
    /// Fresh state with default tickets and no donations
    pub fn new(id: ThreadId) -> Self {
        Self {
            id,
            base: PRIORITY_DEFAULT,
            effective: EffectiveWeight::Expired,
            held: Vec::new(),
            join_queue: None,
            waiting_in: None,
        }
    }

    /// Owning thread
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Current ticket count
    pub fn base_weight(&self) -> Tickets {
        self.base
    }

    /// Replace the ticket count
    ///
    /// Leaves the state untouched when `tickets` is out of range. On success
    /// the cached effective weight is expired; threads this one donates to
    /// are expired by the donation graph.
    pub fn set_base_weight(&mut self, tickets: u64) -> SchedResult<()> {
        let tickets = Tickets::try_from(tickets)
            .ok()
            .filter(|&t| in_range(t))
            .ok_or(SchedError::InvalidWeight {
                requested: tickets,
                min: PRIORITY_MINIMUM,
                max: PRIORITY_MAXIMUM,
            })?;

        self.base = tickets;
        self.expire();
        Ok(())
    }

    /// Cached effective weight, if fresh
    pub fn cached(&self) -> Option<u64> {
        self.effective.get()
    }

    /// Raw cache slot
    pub fn effective(&self) -> EffectiveWeight {
        self.effective
    }

    pub(crate) fn store(&mut self, weight: u64) {
        self.effective = EffectiveWeight::Fresh(weight);
    }

    /// Mark the cache expired, returning whether it held a value
    pub(crate) fn expire(&mut self) -> bool {
        let was_fresh = self.effective.get().is_some();
        self.effective = EffectiveWeight::Expired;
        was_fresh
    }

    /// Resource queues held by this thread
    ///
    /// Transferring ones are this thread's lock donation sources.
    pub fn held_queues(&self) -> &[QueueId] {
        &self.held
    }

    pub(crate) fn add_held(&mut self, queue: QueueId) {
        if !self.held.contains(&queue) {
            self.held.push(queue);
        }
    }

    pub(crate) fn remove_held(&mut self, queue: QueueId) {
        self.held.retain(|&q| q != queue);
    }

    /// Queue of threads joined on this one, once somebody has joined
    pub fn join_queue(&self) -> Option<QueueId> {
        self.join_queue
    }

    pub(crate) fn set_join_queue(&mut self, queue: QueueId) {
        self.join_queue = Some(queue);
    }

    /// Queue this thread is waiting in
    pub fn waiting_in(&self) -> Option<QueueId> {
        self.waiting_in
    }

    pub(crate) fn set_waiting_in(&mut self, queue: Option<QueueId>) {
        self.waiting_in = queue;
    }
}
