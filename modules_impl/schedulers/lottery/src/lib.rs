//! # Lottery Scheduler Module
//!
//! Selects the next thread to run, or to receive a contended resource, by
//! weighted random draw. Each thread holds a number of tickets; a waiting
//! thread lends its tickets to whoever holds the lock it waits on, or to
//! the thread it is joined on, so low-ticket holders are not starved by
//! the waiters they block.
//!
//! ## Components
//!
//! - **Thread state** ([`ThreadState`]): base tickets and a memoized
//!   effective weight
//! - **Donation graph** ([`DonationGraph`]): lock and join edges, with a
//!   cycle-guarded weight walk over an explicit stack
//! - **Lottery queue** ([`LotteryQueue`]): a waiting set and the weighted
//!   draw
//! - **Scheduler** ([`LotteryScheduler`]): the public operations, run inside
//!   the caller's critical section
//!
//! ## Example
//!
//! ```
//! use helix_scheduler_lottery::{LotteryConfig, LotteryScheduler, SoftInterrupts, ThreadId};
//!
//! let irq = SoftInterrupts::new();
//! let mut sched = LotteryScheduler::with_seed(LotteryConfig::default(), &irq);
//! let _guard = irq.guard();
//!
//! let lock = sched.new_queue(true).unwrap();
//! let (holder, waiter) = (ThreadId::new(1), ThreadId::new(2));
//! sched.acquire(lock, holder).unwrap();
//! sched.set_base_weight(waiter, 5).unwrap();
//! sched.wait_for_access(lock, waiter).unwrap();
//!
//! assert_eq!(sched.effective_weight(holder), 6);
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod config;
pub mod donation;
pub mod error;
pub mod interrupts;
pub mod policy;
pub mod queue;
pub mod scheduler;
pub mod stats;
pub mod sync;
pub mod thread;

pub use config::{LotteryConfig, PRIORITY_DEFAULT, PRIORITY_MAXIMUM, PRIORITY_MINIMUM};
pub use donation::DonationGraph;
pub use error::{SchedError, SchedResult};
pub use interrupts::{InterruptControl, InterruptGuard, LockHeld, SoftInterrupts};
pub use policy::Policy;
pub use queue::{LotteryQueue, QueueId, QueueKind};
pub use scheduler::{DefaultRng, LotteryScheduler};
pub use stats::SchedStats;
pub use sync::SharedScheduler;
pub use thread::{EffectiveWeight, ThreadId, ThreadState, Tickets};
