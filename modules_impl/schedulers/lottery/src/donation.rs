//! # Donation Graph
//!
//! Owns every thread state and queue, and answers "how much weight does
//! this thread carry right now".
//!
//! ## Edges
//!
//! ```text
//!   waiter ──waits in──▶ queue ──transfers to──▶ holder
//!
//!   W1 ─┐
//!   W2 ─┼─▶ [lock Q, transfers] ──▶ H ──waits in──▶ [lock R] ──▶ H2
//!        │
//!   J1 ──▶ [join queue of H] ───────▶ H
//! ```
//!
//! A thread receives weight from two sources: every transferring queue it
//! holds (in the order it became holder) and its join queue, which is
//! allocated the first time another thread joins it. The effective weight
//! is the base tickets folded with the effective weight of every waiter in
//! those queues, transitively.
//!
//! ## Cycles
//!
//! A thread waits in at most one queue, but the holder of that queue may
//! itself be waiting on something the first thread holds. The walk carries
//! the set of threads currently being computed; revisiting one of them
//! counts its base tickets and stops. This keeps the scheduler running
//! through a deadlock, it does not resolve the deadlock. Values computed
//! across a cycle depend on where the walk started, so they are never
//! cached.
//!
//! Chains can be as long as the number of threads, so the walk keeps its
//! frames in a heap-allocated stack instead of recursing.
//!
//! ## Invalidation
//!
//! A thread's effective weight depends only on threads upstream of it.
//! Any change at a thread expires that thread and every thread it
//! transitively donates to.
//!
//! A value is only stored once every donor below it has been stored, so a
//! fresh thread never has an expired donor. Invalidation can therefore
//! stop at the first expired thread past its starting point: everything
//! downstream of it is already expired.
//!
//! ## Queue Slots
//!
//! Queues live in a slot table. A join queue's slot is released when its
//! thread is removed and handed to the next queue created, so the table
//! tracks live queues rather than every thread ever seen.

use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};
use log::warn;

use crate::error::{SchedError, SchedResult};
use crate::policy::Policy;
use crate::queue::{LotteryQueue, QueueId, QueueKind};
use crate::stats::SchedStats;
use crate::thread::{ThreadId, ThreadState};

/// Weight of one finished subtree
#[derive(Debug, Clone, Copy)]
struct Computed {
    weight: u64,
    /// A donation cycle was cut somewhere below this thread
    cyclic: bool,
}

/// A thread whose donors are still being folded in
#[derive(Debug)]
struct Frame {
    id: ThreadId,
    donors: Vec<ThreadId>,
    cursor: usize,
    weight: u64,
    cyclic: bool,
}

impl Frame {
    fn next_donor(&mut self) -> Option<ThreadId> {
        let donor = self.donors.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(donor)
    }

    fn absorb(&mut self, policy: Policy, donated: Computed) {
        self.weight = policy.fold(self.weight, donated.weight);
        self.cyclic |= donated.cyclic;
    }
}

/// First look at a thread during a weight walk
enum Visit {
    /// Answer known without looking at donors
    Done(Computed),
    /// Donors must be folded in
    Expand(Frame),
}

/// Thread states, queues and the edges between them
#[derive(Debug, Default)]
pub struct DonationGraph {
    threads: HashMap<ThreadId, ThreadState>,
    /// Slot per queue; `None` while free
    queues: Vec<Option<LotteryQueue>>,
    /// Released slots, reused before the table grows
    free: Vec<QueueId>,
}

impl DonationGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Queues
    // =========================================================================

    /// Register a queue and return its handle
    ///
    /// Fails with [`SchedError::QueueLimit`] once every handle is taken.
    pub fn add_queue(&mut self, queue: LotteryQueue) -> SchedResult<QueueId> {
        if let Some(id) = self.free.pop() {
            if let Some(slot) = self.queues.get_mut(id.index()) {
                *slot = Some(queue);
                return Ok(id);
            }
        }

        let id = QueueId::from_index(self.queues.len()).ok_or(SchedError::QueueLimit)?;
        self.queues.push(Some(queue));
        Ok(id)
    }

    fn release_queue(&mut self, id: QueueId) {
        if let Some(slot) = self.queues.get_mut(id.index()) {
            if slot.take().is_some() {
                self.free.push(id);
            }
        }
    }

    /// Look up a queue
    pub fn queue(&self, id: QueueId) -> SchedResult<&LotteryQueue> {
        self.queues
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SchedError::UnknownQueue(id))
    }

    fn queue_mut(&mut self, id: QueueId) -> SchedResult<&mut LotteryQueue> {
        self.queues
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SchedError::UnknownQueue(id))
    }

    /// Number of live queues
    pub fn queue_count(&self) -> usize {
        self.queues.len() - self.free.len()
    }

    // =========================================================================
    // Threads
    // =========================================================================

    /// State of a known thread
    pub fn thread(&self, id: ThreadId) -> Option<&ThreadState> {
        self.threads.get(&id)
    }

    /// Whether the graph has state for `id`
    pub fn contains_thread(&self, id: ThreadId) -> bool {
        self.threads.contains_key(&id)
    }

    /// Number of known threads
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// State of `id`, created with default tickets on first access
    pub(crate) fn state_mut(&mut self, id: ThreadId) -> &mut ThreadState {
        self.threads.entry(id).or_insert_with(|| ThreadState::new(id))
    }

    /// Join queue of `id`, allocated on first use
    pub(crate) fn join_queue_of(&mut self, id: ThreadId) -> SchedResult<QueueId> {
        if let Some(queue) = self.state_mut(id).join_queue() {
            return Ok(queue);
        }
        let queue = self.add_queue(LotteryQueue::join(id))?;
        self.state_mut(id).set_join_queue(queue);
        Ok(queue)
    }

    /// Drop a thread's state and release its join queue
    pub(crate) fn remove_thread(&mut self, id: ThreadId) -> Option<ThreadState> {
        let state = self.threads.remove(&id)?;
        if let Some(join) = state.join_queue() {
            self.release_queue(join);
        }
        Some(state)
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Thread that `id` currently donates to
    pub fn donation_target(&self, id: ThreadId) -> Option<ThreadId> {
        let queue = self.threads.get(&id)?.waiting_in()?;
        self.queue(queue).ok()?.donation_target()
    }

    /// Threads donating directly to `id`, in canonical order
    ///
    /// Waiters of held queues in the order the queues were acquired, each in
    /// insertion order, followed by the waiters of the join queue.
    pub fn donors(&self, id: ThreadId) -> Vec<ThreadId> {
        let mut donors = Vec::new();
        let Some(state) = self.threads.get(&id) else {
            return donors;
        };

        for &held in state.held_queues() {
            if let Ok(queue) = self.queue(held) {
                if queue.donation_target() == Some(id) {
                    donors.extend_from_slice(queue.waiters());
                }
            }
        }
        if let Some(join) = state.join_queue().and_then(|q| self.queue(q).ok()) {
            donors.extend_from_slice(join.waiters());
        }
        donors
    }

    /// Expire `from` and every thread it transitively donates to
    ///
    /// `from` itself is always passed through, since callers may have
    /// expired it already; past it the walk ends at the first thread that
    /// was not fresh.
    pub fn invalidate(&mut self, from: ThreadId, stats: &mut SchedStats) {
        let mut visited = HashSet::new();
        let mut next = Some(from);

        while let Some(id) = next {
            if !visited.insert(id) {
                break;
            }
            if let Some(state) = self.threads.get_mut(&id) {
                if state.expire() {
                    stats.invalidations += 1;
                } else if id != from {
                    break;
                }
            }
            next = self.donation_target(id);
        }
    }

    /// Add `thread` to `queue`'s waiting set
    ///
    /// Enqueuing a thread already waiting in `queue` is a no-op.
    pub fn enqueue(&mut self, queue: QueueId, thread: ThreadId, stats: &mut SchedStats) -> SchedResult<()> {
        let target = self.queue(queue)?.donation_target();

        match self.state_mut(thread).waiting_in() {
            Some(current) if current == queue => return Ok(()),
            Some(current) => {
                return Err(SchedError::AlreadyWaiting {
                    thread,
                    queue: current,
                })
            },
            None => {},
        }

        self.queue_mut(queue)?.enqueue(thread);
        self.state_mut(thread).set_waiting_in(Some(queue));
        if let Some(holder) = target {
            self.invalidate(holder, stats);
        }
        Ok(())
    }

    /// Remove `thread` from `queue`; returns whether it was waiting there
    pub fn remove(&mut self, queue: QueueId, thread: ThreadId, stats: &mut SchedStats) -> SchedResult<bool> {
        let q = self.queue_mut(queue)?;
        if !q.remove(thread) {
            return Ok(false);
        }
        let target = q.donation_target();

        self.detach(thread, queue);
        if let Some(holder) = target {
            self.invalidate(holder, stats);
        }
        Ok(true)
    }

    /// Remove the waiter at `index` in `queue`'s iteration order
    pub(crate) fn take(&mut self, queue: QueueId, index: usize, stats: &mut SchedStats) -> SchedResult<ThreadId> {
        let q = self.queue_mut(queue)?;
        let thread = q.take(index);
        let target = q.donation_target();

        self.detach(thread, queue);
        if let Some(holder) = target {
            self.invalidate(holder, stats);
        }
        Ok(thread)
    }

    /// Remove every waiter of `queue`, in insertion order
    pub(crate) fn drain(&mut self, queue: QueueId, stats: &mut SchedStats) -> SchedResult<Vec<ThreadId>> {
        let q = self.queue_mut(queue)?;
        let released = q.drain();
        let target = q.donation_target();

        for &thread in &released {
            self.detach(thread, queue);
        }
        match target {
            Some(holder) if !released.is_empty() => self.invalidate(holder, stats),
            _ => {},
        }
        Ok(released)
    }

    fn detach(&mut self, thread: ThreadId, queue: QueueId) {
        if let Some(state) = self.threads.get_mut(&thread) {
            if state.waiting_in() == Some(queue) {
                state.set_waiting_in(None);
            }
        }
    }

    /// Move `queue`'s holder, re-pointing its donation edge
    ///
    /// Returns the previous holder. Join queues always belong to their
    /// owning thread and are rejected.
    pub fn set_holder(
        &mut self,
        queue: QueueId,
        holder: Option<ThreadId>,
        stats: &mut SchedStats,
    ) -> SchedResult<Option<ThreadId>> {
        let q = self.queue_mut(queue)?;
        if q.kind() == QueueKind::Join {
            return Err(SchedError::JoinQueue(queue));
        }
        let transfers = q.transfers_weight();
        let previous = q.set_holder(holder);
        if previous == holder {
            return Ok(previous);
        }

        if let Some(old) = previous {
            if let Some(state) = self.threads.get_mut(&old) {
                state.remove_held(queue);
            }
            if transfers {
                self.invalidate(old, stats);
            }
        }
        if let Some(new) = holder {
            self.state_mut(new).add_held(queue);
            if transfers {
                self.invalidate(new, stats);
            }
        }
        Ok(previous)
    }

    // =========================================================================
    // Effective Weight
    // =========================================================================

    /// Effective weight of `id` under `policy`
    ///
    /// Creates state for an unknown thread. With `cache` set, clean results
    /// are memoized on every thread visited.
    pub fn effective_weight(&mut self, id: ThreadId, policy: Policy, cache: bool, stats: &mut SchedStats) -> u64 {
        let mut visiting = HashSet::new();
        let mut stack = match self.visit(id, &visiting, stats) {
            Visit::Done(done) => return done.weight,
            Visit::Expand(frame) => {
                visiting.insert(id);
                alloc::vec![frame]
            },
        };

        let mut weight = 0;
        while let Some(top) = stack.last_mut() {
            if let Some(donor) = top.next_donor() {
                match self.visit(donor, &visiting, stats) {
                    Visit::Expand(frame) => {
                        visiting.insert(donor);
                        stack.push(frame);
                    },
                    Visit::Done(done) => {
                        if let Some(top) = stack.last_mut() {
                            top.absorb(policy, done);
                        }
                    },
                }
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            visiting.remove(&frame.id);
            if cache && !frame.cyclic {
                self.state_mut(frame.id).store(frame.weight);
            }

            let done = Computed {
                weight: frame.weight,
                cyclic: frame.cyclic,
            };
            match stack.last_mut() {
                Some(parent) => parent.absorb(policy, done),
                None => weight = done.weight,
            }
        }
        weight
    }

    fn visit(&mut self, id: ThreadId, visiting: &HashSet<ThreadId>, stats: &mut SchedStats) -> Visit {
        let state = self.state_mut(id);
        let base = u64::from(state.base_weight());
        let cached = state.cached();

        if visiting.contains(&id) {
            stats.cycles_detected += 1;
            warn!("Lottery: donation cycle through thread {}, counting base weight only", id);
            return Visit::Done(Computed {
                weight: base,
                cyclic: true,
            });
        }
        if let Some(weight) = cached {
            stats.cache_hits += 1;
            return Visit::Done(Computed { weight, cyclic: false });
        }

        stats.weight_recomputations += 1;
        Visit::Expand(Frame {
            id,
            donors: self.donors(id),
            cursor: 0,
            weight: base,
            cyclic: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: u64) -> ThreadId {
        ThreadId::new(raw)
    }

    fn weight(graph: &mut DonationGraph, id: ThreadId, stats: &mut SchedStats) -> u64 {
        graph.effective_weight(id, Policy::Lottery, true, stats)
    }

    #[test]
    fn test_state_created_lazily() {
        let mut graph = DonationGraph::new();
        assert!(!graph.contains_thread(t(1)));

        assert_eq!(graph.state_mut(t(1)).join_queue(), None);
        assert!(graph.contains_thread(t(1)));
        assert_eq!(graph.queue_count(), 0);

        let join = graph.join_queue_of(t(1)).unwrap();
        assert_eq!(graph.queue(join).unwrap().holder(), Some(t(1)));

        // Second access reuses the same state and join queue
        assert_eq!(graph.join_queue_of(t(1)).unwrap(), join);
        assert_eq!(graph.state_mut(t(1)).join_queue(), Some(join));
        assert_eq!(graph.thread_count(), 1);
        assert_eq!(graph.queue_count(), 1);
    }

    #[test]
    fn test_donors_canonical_order() {
        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();
        let first = graph.add_queue(LotteryQueue::new(true)).unwrap();
        let second = graph.add_queue(LotteryQueue::new(true)).unwrap();

        graph.set_holder(second, Some(t(1)), &mut stats).unwrap();
        graph.set_holder(first, Some(t(1)), &mut stats).unwrap();
        graph.enqueue(first, t(10), &mut stats).unwrap();
        graph.enqueue(second, t(20), &mut stats).unwrap();
        graph.enqueue(second, t(21), &mut stats).unwrap();

        let join = graph.join_queue_of(t(1)).unwrap();
        graph.enqueue(join, t(30), &mut stats).unwrap();

        assert_eq!(graph.donors(t(1)), vec![t(20), t(21), t(10), t(30)]);
    }

    #[test]
    fn test_transitive_donation() {
        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();
        let lock_a = graph.add_queue(LotteryQueue::new(true)).unwrap();
        let lock_b = graph.add_queue(LotteryQueue::new(true)).unwrap();

        // t3 waits on t2 which waits on t1
        graph.set_holder(lock_a, Some(t(1)), &mut stats).unwrap();
        graph.set_holder(lock_b, Some(t(2)), &mut stats).unwrap();
        graph.state_mut(t(3)).set_base_weight(5).unwrap();
        graph.state_mut(t(2)).set_base_weight(2).unwrap();
        graph.enqueue(lock_b, t(3), &mut stats).unwrap();
        graph.enqueue(lock_a, t(2), &mut stats).unwrap();

        assert_eq!(weight(&mut graph, t(1), &mut stats), 1 + 2 + 5);
        assert_eq!(weight(&mut graph, t(2), &mut stats), 7);
        assert_eq!(weight(&mut graph, t(3), &mut stats), 5);
    }

    #[test]
    fn test_non_transferring_queue() {
        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();
        let cond = graph.add_queue(LotteryQueue::new(false)).unwrap();

        graph.set_holder(cond, Some(t(1)), &mut stats).unwrap();
        graph.state_mut(t(2)).set_base_weight(50).unwrap();
        graph.enqueue(cond, t(2), &mut stats).unwrap();

        assert_eq!(graph.thread(t(1)).unwrap().held_queues(), &[cond]);
        assert!(graph.donors(t(1)).is_empty());
        assert_eq!(weight(&mut graph, t(1), &mut stats), 1);
    }

    #[test]
    fn test_cache_invalidated_down_chain() {
        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();
        let lock_a = graph.add_queue(LotteryQueue::new(true)).unwrap();
        let lock_b = graph.add_queue(LotteryQueue::new(true)).unwrap();
        graph.set_holder(lock_a, Some(t(1)), &mut stats).unwrap();
        graph.set_holder(lock_b, Some(t(2)), &mut stats).unwrap();
        graph.enqueue(lock_a, t(2), &mut stats).unwrap();
        graph.enqueue(lock_b, t(3), &mut stats).unwrap();

        assert_eq!(weight(&mut graph, t(1), &mut stats), 3);
        assert_eq!(graph.thread(t(1)).unwrap().cached(), Some(3));

        graph.state_mut(t(3)).set_base_weight(10).unwrap();
        graph.invalidate(t(3), &mut stats);
        assert_eq!(graph.thread(t(1)).unwrap().cached(), None);
        assert_eq!(graph.thread(t(2)).unwrap().cached(), None);

        assert_eq!(weight(&mut graph, t(1), &mut stats), 12);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();
        let lock_a = graph.add_queue(LotteryQueue::new(true)).unwrap();
        let lock_b = graph.add_queue(LotteryQueue::new(true)).unwrap();

        graph.set_holder(lock_a, Some(t(1)), &mut stats).unwrap();
        graph.set_holder(lock_b, Some(t(2)), &mut stats).unwrap();
        graph.state_mut(t(1)).set_base_weight(3).unwrap();
        graph.state_mut(t(2)).set_base_weight(4).unwrap();
        graph.enqueue(lock_a, t(2), &mut stats).unwrap();
        graph.enqueue(lock_b, t(1), &mut stats).unwrap();

        // t1 = 3 + (t2 = 4 + base of revisited t1)
        assert_eq!(weight(&mut graph, t(1), &mut stats), 3 + 4 + 3);
        assert_eq!(weight(&mut graph, t(2), &mut stats), 4 + 3 + 4);
        assert_eq!(stats.cycles_detected, 2);

        // Nothing computed across the cycle is cached
        assert_eq!(graph.thread(t(1)).unwrap().cached(), None);
        assert_eq!(graph.thread(t(2)).unwrap().cached(), None);
    }

    #[test]
    fn test_priority_policy_takes_max() {
        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();
        let lock = graph.add_queue(LotteryQueue::new(true)).unwrap();
        graph.set_holder(lock, Some(t(1)), &mut stats).unwrap();
        graph.state_mut(t(2)).set_base_weight(4).unwrap();
        graph.state_mut(t(3)).set_base_weight(9).unwrap();
        graph.enqueue(lock, t(2), &mut stats).unwrap();
        graph.enqueue(lock, t(3), &mut stats).unwrap();

        assert_eq!(graph.effective_weight(t(1), Policy::Priority, false, &mut stats), 9);
        assert_eq!(graph.effective_weight(t(1), Policy::Lottery, false, &mut stats), 14);
    }

    #[test]
    fn test_join_queue_holder_is_fixed() {
        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();
        let join = graph.join_queue_of(t(1)).unwrap();

        assert_eq!(
            graph.set_holder(join, Some(t(2)), &mut stats),
            Err(SchedError::JoinQueue(join))
        );
    }

    #[test]
    fn test_remove_thread_frees_join_queue() {
        let mut graph = DonationGraph::new();
        let join = graph.join_queue_of(t(1)).unwrap();

        assert!(graph.remove_thread(t(1)).is_some());
        assert_eq!(graph.queue(join).err(), Some(SchedError::UnknownQueue(join)));
        assert!(graph.remove_thread(t(1)).is_none());

        // The freed slot is handed to the next queue
        assert_eq!(graph.add_queue(LotteryQueue::new(true)), Ok(join));
    }

    #[test]
    fn test_join_slots_reused() {
        let mut graph = DonationGraph::new();
        let lock = graph.add_queue(LotteryQueue::new(true)).unwrap();

        for raw in 0..10_000 {
            let join = graph.join_queue_of(t(raw)).unwrap();
            assert_eq!(join, QueueId::from_raw(1));
            graph.remove_thread(t(raw));
        }

        assert_eq!(graph.thread_count(), 0);
        assert_eq!(graph.queue_count(), 1);
        assert_eq!(graph.add_queue(LotteryQueue::new(false)), Ok(QueueId::from_raw(1)));
        assert_eq!(graph.add_queue(LotteryQueue::new(false)), Ok(QueueId::from_raw(2)));
        assert!(graph.queue(lock).is_ok());
    }

    #[test]
    fn test_deep_chain() {
        const DEPTH: u64 = 100_000;

        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();

        // Thread i holds lock i and waits on lock i - 1, built head first
        let mut previous = None;
        for raw in 0..DEPTH {
            let lock = graph.add_queue(LotteryQueue::new(true)).unwrap();
            graph.set_holder(lock, Some(t(raw)), &mut stats).unwrap();
            if let Some(prev) = previous {
                graph.enqueue(prev, t(raw), &mut stats).unwrap();
            }
            previous = Some(lock);
        }
        assert_eq!(stats.invalidations, 0);

        assert_eq!(weight(&mut graph, t(0), &mut stats), DEPTH);
        assert_eq!(stats.weight_recomputations, DEPTH);
        assert_eq!(graph.thread(t(DEPTH / 2)).unwrap().cached(), Some(DEPTH / 2));

        // A change at the tail expires the whole chain once
        graph.state_mut(t(DEPTH - 1)).set_base_weight(2).unwrap();
        graph.invalidate(t(DEPTH - 1), &mut stats);
        assert_eq!(stats.invalidations, DEPTH - 1);
        assert_eq!(graph.thread(t(0)).unwrap().cached(), None);

        assert_eq!(weight(&mut graph, t(0), &mut stats), DEPTH + 1);
    }

    #[test]
    fn test_deep_cycle() {
        const DEPTH: u64 = 50_000;

        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();
        let locks: Vec<_> = (0..DEPTH)
            .map(|raw| {
                let lock = graph.add_queue(LotteryQueue::new(true)).unwrap();
                graph.set_holder(lock, Some(t(raw)), &mut stats).unwrap();
                lock
            })
            .collect();

        // Thread i waits on lock i - 1, and thread 0 closes the ring
        for raw in 1..DEPTH {
            graph.enqueue(locks[raw as usize - 1], t(raw), &mut stats).unwrap();
        }
        graph.enqueue(locks[DEPTH as usize - 1], t(0), &mut stats).unwrap();

        assert_eq!(weight(&mut graph, t(0), &mut stats), DEPTH + 1);
        assert_eq!(stats.cycles_detected, 1);
        assert_eq!(graph.thread(t(1)).unwrap().cached(), None);
    }

    #[test]
    fn test_invalidation_stops_at_expired() {
        let mut stats = SchedStats::default();
        let mut graph = DonationGraph::new();
        let lock_a = graph.add_queue(LotteryQueue::new(true)).unwrap();
        let lock_b = graph.add_queue(LotteryQueue::new(true)).unwrap();
        graph.set_holder(lock_a, Some(t(1)), &mut stats).unwrap();
        graph.set_holder(lock_b, Some(t(2)), &mut stats).unwrap();
        graph.enqueue(lock_a, t(2), &mut stats).unwrap();
        graph.enqueue(lock_b, t(3), &mut stats).unwrap();

        assert_eq!(weight(&mut graph, t(1), &mut stats), 3);
        graph.invalidate(t(3), &mut stats);
        assert_eq!(stats.invalidations, 3);

        // Everything downstream is already expired
        graph.invalidate(t(3), &mut stats);
        assert_eq!(stats.invalidations, 3);

        // Only t2 and t3 were recomputed and stored; the walk ends at t1
        assert_eq!(weight(&mut graph, t(2), &mut stats), 2);
        graph.invalidate(t(3), &mut stats);
        assert_eq!(stats.invalidations, 5);

        // Starting at an expired thread still reaches fresh ones past it
        assert_eq!(weight(&mut graph, t(1), &mut stats), 3);
        graph.state_mut(t(2)).set_base_weight(4).unwrap();
        graph.invalidate(t(2), &mut stats);
        assert_eq!(graph.thread(t(1)).unwrap().cached(), None);
        assert_eq!(graph.thread(t(3)).unwrap().cached(), Some(1));
        assert_eq!(weight(&mut graph, t(1), &mut stats), 1 + 4 + 1);
    }
}
