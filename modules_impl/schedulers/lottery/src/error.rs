//! # Scheduler Errors
//!
//! Recoverable failures of scheduler operations.
//!
//! Invariant violations are not represented here: calling into the
//! scheduler without the critical section held, or drawing from a waiting
//! set whose total weight is zero, panics instead.

use core::fmt;

use crate::queue::QueueId;
use crate::thread::{ThreadId, Tickets};

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Scheduler error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// Ticket count outside the configured bounds
    InvalidWeight {
        /// Rejected ticket count
        requested: u64,
        /// Lower bound
        min: Tickets,
        /// Upper bound
        max: Tickets,
    },
    /// Queue handle does not name a live queue
    UnknownQueue(QueueId),
    /// Thread is already waiting in another queue
    AlreadyWaiting {
        /// The thread
        thread: ThreadId,
        /// Queue it is waiting in
        queue: QueueId,
    },
    /// A thread tried to join itself
    SelfJoin(ThreadId),
    /// Queue still has waiters and cannot be acquired directly
    QueueNotEmpty(QueueId),
    /// Join queues are owned by their thread and cannot change holder
    JoinQueue(QueueId),
    /// Every queue handle is in use
    QueueLimit,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::InvalidWeight { requested, min, max } => {
                write!(f, "ticket count {} outside [{}, {}]", requested, min, max)
            },
            SchedError::UnknownQueue(queue) => write!(f, "unknown queue {}", queue),
            SchedError::AlreadyWaiting { thread, queue } => {
                write!(f, "thread {} is already waiting in queue {}", thread, queue)
            },
            SchedError::SelfJoin(thread) => write!(f, "thread {} cannot join itself", thread),
            SchedError::QueueNotEmpty(queue) => write!(f, "queue {} still has waiters", queue),
            SchedError::JoinQueue(queue) => write!(f, "queue {} is a join queue", queue),
            SchedError::QueueLimit => write!(f, "queue table full"),
        }
    }
}
