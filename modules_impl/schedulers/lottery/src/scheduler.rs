//! # Lottery Scheduler
//!
//! Public entry point. Every operation requires the caller to hold the
//! scheduler critical section (interrupts disabled) and panics otherwise.
//!
//! ## Thread lifecycle
//!
//! ```text
//!   Unqueued ──wait_for_access / join──▶ Waiting(queue)
//!      ▲                                     │
//!      │                       pick_next / next_thread / remove
//!      │                                     ▼
//!      └──────────── (running, external) ◀── Dequeued
//! ```
//!
//! A thread waits in at most one queue at a time and may hold any number
//! of queues.

use alloc::vec::Vec;

use log::{debug, trace, warn};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use crate::config::{LotteryConfig, PRIORITY_MAXIMUM, PRIORITY_MINIMUM};
use crate::donation::DonationGraph;
use crate::error::{SchedError, SchedResult};
use crate::interrupts::InterruptControl;
use crate::queue::{LotteryQueue, QueueId, QueueKind};
use crate::stats::SchedStats;
use crate::thread::{ThreadId, Tickets};

/// Random source used by [`LotteryScheduler::with_seed`]
pub type DefaultRng = SmallRng;

/// Lottery scheduler with ticket donation through locks and joins
#[derive(Debug)]
pub struct LotteryScheduler<R, I> {
    config: LotteryConfig,
    rng: R,
    irq: I,
    graph: DonationGraph,
    stats: SchedStats,
}

impl<I: InterruptControl> LotteryScheduler<DefaultRng, I> {
    /// Create a scheduler whose random source is seeded from `config.seed`
    pub fn with_seed(config: LotteryConfig, irq: I) -> Self {
        Self::new(config, SmallRng::seed_from_u64(config.seed), irq)
    }
}

impl<R: RngCore, I: InterruptControl> LotteryScheduler<R, I> {
    /// Create a scheduler drawing from `rng`
    pub fn new(config: LotteryConfig, rng: R, irq: I) -> Self {
        debug!("Lottery: scheduler created with {:?}", config);
        Self {
            config,
            rng,
            irq,
            graph: DonationGraph::new(),
            stats: SchedStats::default(),
        }
    }

    #[inline]
    #[track_caller]
    fn assert_critical(&self) {
        assert!(
            self.irq.interrupts_disabled(),
            "precondition violation: scheduler entered with interrupts enabled"
        );
    }

    /// Active configuration
    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    /// Counters since creation or the last reset
    pub fn stats(&self) -> SchedStats {
        self.stats
    }

    /// Zero the counters
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Read-only view of the donation graph
    pub fn graph(&self) -> &DonationGraph {
        self.assert_critical();
        &self.graph
    }

    // =========================================================================
    // Queues
    // =========================================================================

    /// Allocate a queue
    ///
    /// With `transfers_weight` set, waiters donate their effective weight
    /// to whichever thread holds the queue. Handles of finished threads'
    /// join queues are reused.
    pub fn new_queue(&mut self, transfers_weight: bool) -> SchedResult<QueueId> {
        self.assert_critical();
        self.graph.add_queue(LotteryQueue::new(transfers_weight))
    }

    /// Block `thread` in `queue`
    ///
    /// Idempotent for a thread already waiting in `queue`; fails if it is
    /// waiting anywhere else.
    pub fn wait_for_access(&mut self, queue: QueueId, thread: ThreadId) -> SchedResult<()> {
        self.assert_critical();
        self.graph.enqueue(queue, thread, &mut self.stats)
    }

    /// Abandon `thread`'s wait in `queue`; no-op if it is not there
    pub fn remove(&mut self, queue: QueueId, thread: ThreadId) -> SchedResult<bool> {
        self.assert_critical();
        self.graph.remove(queue, thread, &mut self.stats)
    }

    /// Draw a winner from `queue` and dequeue it
    ///
    /// Returns `Ok(None)` for an empty queue without computing any weight.
    ///
    /// # Panics
    ///
    /// Panics if the waiters' weights sum to zero.
    pub fn pick_next(&mut self, queue: QueueId) -> SchedResult<Option<ThreadId>> {
        self.assert_critical();

        let waiters: Vec<ThreadId> = self.graph.queue(queue)?.waiters().to_vec();
        if waiters.is_empty() {
            self.stats.empty_draws += 1;
            return Ok(None);
        }

        let mut weights = Vec::with_capacity(waiters.len());
        for &thread in &waiters {
            weights.push(self.graph.effective_weight(
                thread,
                self.config.policy,
                self.config.cache_weights,
                &mut self.stats,
            ));
        }

        let Some(index) = self.config.policy.select(&weights, &mut self.rng) else {
            return Ok(None);
        };
        let winner = self.graph.take(queue, index, &mut self.stats)?;
        self.stats.draws += 1;

        trace!(
            "Lottery: {} won {} ({} of {} tickets)",
            winner,
            queue,
            weights[index],
            weights.iter().fold(0u64, |acc, &w| acc.saturating_add(w))
        );
        Ok(Some(winner))
    }

    /// Give `thread` the queue without waiting
    ///
    /// The queue must have no waiters.
    pub fn acquire(&mut self, queue: QueueId, thread: ThreadId) -> SchedResult<()> {
        self.assert_critical();
        if !self.graph.queue(queue)?.is_empty() {
            return Err(SchedError::QueueNotEmpty(queue));
        }
        self.graph.set_holder(queue, Some(thread), &mut self.stats)?;
        debug!("Lottery: {} acquired {}", thread, queue);
        Ok(())
    }

    /// Draw a winner and hand it the queue
    ///
    /// With no waiters the queue is left without a holder.
    pub fn next_thread(&mut self, queue: QueueId) -> SchedResult<Option<ThreadId>> {
        self.assert_critical();
        if self.graph.queue(queue)?.kind() == QueueKind::Join {
            return Err(SchedError::JoinQueue(queue));
        }

        let winner = self.pick_next(queue)?;
        self.graph.set_holder(queue, winner, &mut self.stats)?;
        if let Some(thread) = winner {
            debug!("Lottery: {} handed to {}", queue, thread);
        }
        Ok(winner)
    }

    /// Clear the holder of `queue`, returning it
    pub fn release(&mut self, queue: QueueId) -> SchedResult<Option<ThreadId>> {
        self.assert_critical();
        self.graph.set_holder(queue, None, &mut self.stats)
    }

    /// Current holder of `queue`
    pub fn holder(&self, queue: QueueId) -> SchedResult<Option<ThreadId>> {
        self.assert_critical();
        Ok(self.graph.queue(queue)?.holder())
    }

    /// Threads waiting in `queue`, in insertion order
    pub fn waiters(&self, queue: QueueId) -> SchedResult<&[ThreadId]> {
        self.assert_critical();
        Ok(self.graph.queue(queue)?.waiters())
    }

    /// Whether `queue` donates to its holder
    pub fn transfers_weight(&self, queue: QueueId) -> SchedResult<bool> {
        self.assert_critical();
        Ok(self.graph.queue(queue)?.transfers_weight())
    }

    // =========================================================================
    // Weights
    // =========================================================================

    /// Ticket count of `thread`
    pub fn base_weight(&mut self, thread: ThreadId) -> Tickets {
        self.assert_critical();
        self.graph.state_mut(thread).base_weight()
    }

    /// Base tickets plus everything donated to `thread`
    pub fn effective_weight(&mut self, thread: ThreadId) -> u64 {
        self.assert_critical();
        self.graph
            .effective_weight(thread, self.config.policy, self.config.cache_weights, &mut self.stats)
    }

    /// Set the ticket count of `thread`
    ///
    /// Fails without any change if `tickets` is outside
    /// `[PRIORITY_MINIMUM, PRIORITY_MAXIMUM]`.
    pub fn set_base_weight(&mut self, thread: ThreadId, tickets: u64) -> SchedResult<()> {
        self.assert_critical();
        self.graph.state_mut(thread).set_base_weight(tickets)?;
        self.graph.invalidate(thread, &mut self.stats);
        Ok(())
    }

    /// Add one ticket; returns `false` at the upper bound
    pub fn increase_weight(&mut self, thread: ThreadId) -> bool {
        let tickets = self.base_weight(thread);
        if tickets == PRIORITY_MAXIMUM {
            return false;
        }
        self.set_base_weight(thread, u64::from(tickets) + 1).is_ok()
    }

    /// Remove one ticket; returns `false` at the lower bound
    pub fn decrease_weight(&mut self, thread: ThreadId) -> bool {
        let tickets = self.base_weight(thread);
        if tickets == PRIORITY_MINIMUM {
            return false;
        }
        self.set_base_weight(thread, u64::from(tickets) - 1).is_ok()
    }

    // =========================================================================
    // Threads
    // =========================================================================

    /// Whether the scheduler holds state for `thread`
    pub fn is_known(&self, thread: ThreadId) -> bool {
        self.assert_critical();
        self.graph.contains_thread(thread)
    }

    /// Queue `thread` is waiting in
    pub fn waiting_in(&self, thread: ThreadId) -> Option<QueueId> {
        self.assert_critical();
        self.graph.thread(thread).and_then(|state| state.waiting_in())
    }

    /// Block `waiter` until `target` finishes
    ///
    /// `waiter` donates to `target` for as long as it waits.
    pub fn join(&mut self, waiter: ThreadId, target: ThreadId) -> SchedResult<()> {
        self.assert_critical();
        if waiter == target {
            return Err(SchedError::SelfJoin(waiter));
        }
        let join_queue = self.graph.join_queue_of(target)?;
        self.graph.enqueue(join_queue, waiter, &mut self.stats)?;
        debug!("Lottery: {} joined {}", waiter, target);
        Ok(())
    }

    /// Retire `thread`
    ///
    /// Removes it from the queue it waits in, releases every queue it holds
    /// and drops its state. Returns the threads that were joined on it, in
    /// the order they joined.
    pub fn finish(&mut self, thread: ThreadId) -> Vec<ThreadId> {
        self.assert_critical();
        let Some(state) = self.graph.thread(thread) else {
            return Vec::new();
        };
        let waiting_in = state.waiting_in();
        let join_queue = state.join_queue();
        let held = state.held_queues().to_vec();

        if let Some(queue) = waiting_in {
            if let Err(err) = self.graph.remove(queue, thread, &mut self.stats) {
                warn!("Lottery: {} finished while waiting in {}: {}", thread, queue, err);
            }
        }

        for queue in held {
            if let Err(err) = self.graph.set_holder(queue, None, &mut self.stats) {
                warn!("Lottery: {} finished holding {}: {}", thread, queue, err);
            }
        }

        let released = match join_queue.map(|queue| self.graph.drain(queue, &mut self.stats)) {
            Some(Ok(released)) => released,
            Some(Err(err)) => {
                warn!("Lottery: {} finished with a lost join queue: {}", thread, err);
                Vec::new()
            },
            None => Vec::new(),
        };
        self.graph.remove_thread(thread);

        debug!("Lottery: {} finished, releasing {} joiners", thread, released.len());
        released
    }
}
