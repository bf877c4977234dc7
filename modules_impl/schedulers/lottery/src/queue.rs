//! # Lottery Queue
//!
//! A waiting set of threads, an optional holder and the weighted draw.
//!
//! ## Draw
//!
//! ```text
//!  waiters:   T1     T2          T3
//!  weights:   10     20          70
//!  tickets: [0..10)[10..30)[30..............100)
//!                          ^ r = draw in [0, 100)
//! ```
//!
//! Each waiter owns a contiguous span of ticket values as wide as its
//! effective weight, so it wins with probability `w / total`.

use alloc::vec::Vec;
use core::fmt;

use rand::{Rng, RngCore};

use crate::thread::ThreadId;

// =============================================================================
// Queue Identity
// =============================================================================

/// Handle of a queue owned by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId(u32);

impl QueueId {
    /// Build a handle from its slot index
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Handle for slot `index`, if it fits in a handle
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Self)
    }

    /// Slot index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

/// What a queue is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Lock or condition queue created by the runtime
    Resource,
    /// Threads waiting for the owning thread to finish
    Join,
}

// =============================================================================
// Lottery Queue
// =============================================================================

/// Waiting set with an optional holder
#[derive(Debug, Clone)]
pub struct LotteryQueue {
    kind: QueueKind,
    transfers_weight: bool,
    holder: Option<ThreadId>,
    /// Insertion order; selection does not depend on it, iteration does
    waiters: Vec<ThreadId>,
}

impl LotteryQueue {
    /// Create a resource queue
    pub fn new(transfers_weight: bool) -> Self {
        Self {
            kind: QueueKind::Resource,
            transfers_weight,
            holder: None,
            waiters: Vec::new(),
        }
    }

    /// Create the join queue of `owner`; always transfers to the owner
    pub fn join(owner: ThreadId) -> Self {
        Self {
            kind: QueueKind::Join,
            transfers_weight: true,
            holder: Some(owner),
            waiters: Vec::new(),
        }
    }

    /// Queue kind
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Whether waiters donate to the holder
    pub fn transfers_weight(&self) -> bool {
        self.transfers_weight
    }

    /// Current holder
    pub fn holder(&self) -> Option<ThreadId> {
        self.holder
    }

    /// Thread that receives this queue's donations, if any
    pub fn donation_target(&self) -> Option<ThreadId> {
        if self.transfers_weight {
            self.holder
        } else {
            None
        }
    }

    pub(crate) fn set_holder(&mut self, holder: Option<ThreadId>) -> Option<ThreadId> {
        core::mem::replace(&mut self.holder, holder)
    }

    /// Waiting threads in insertion order
    pub fn waiters(&self) -> &[ThreadId] {
        &self.waiters
    }

    /// Number of waiting threads
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Whether no thread is waiting
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Whether `thread` is waiting here
    pub fn contains(&self, thread: ThreadId) -> bool {
        self.waiters.contains(&thread)
    }

    /// Add a waiter; returns `false` if it was already present
    pub fn enqueue(&mut self, thread: ThreadId) -> bool {
        if self.contains(thread) {
            return false;
        }
        self.waiters.push(thread);
        true
    }

    /// Remove a waiter; returns `false` if it was absent
    pub fn remove(&mut self, thread: ThreadId) -> bool {
        match self.waiters.iter().position(|&t| t == thread) {
            Some(index) => {
                self.waiters.remove(index);
                true
            },
            None => false,
        }
    }

    /// Remove the waiter at `index` (in iteration order)
    pub(crate) fn take(&mut self, index: usize) -> ThreadId {
        self.waiters.remove(index)
    }

    /// Remove every waiter, in insertion order
    pub(crate) fn drain(&mut self) -> Vec<ThreadId> {
        core::mem::take(&mut self.waiters)
    }
}

// =============================================================================
// Weighted Draw
// =============================================================================

/// Draw an index with probability proportional to its weight
///
/// Returns `None` for an empty slice.
///
/// # Panics
///
/// Panics if the weights sum to zero. Every thread holds at least one
/// ticket, so a zero total means weights were corrupted elsewhere.
pub fn lottery_draw<R: RngCore>(weights: &[u64], rng: &mut R) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }

    let mut sums = Vec::with_capacity(weights.len());
    let mut total: u64 = 0;
    for &weight in weights {
        total = total.saturating_add(weight);
        sums.push(total);
    }

    assert!(
        total > 0,
        "degenerate weight sum: {} waiters with zero total weight",
        weights.len()
    );

    let ticket = rng.gen_range(0..total);
    sums.iter().position(|&sum| ticket < sum)
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    fn t(raw: u64) -> ThreadId {
        ThreadId::new(raw)
    }

    #[test]
    fn test_queue_id_from_index() {
        assert_eq!(QueueId::from_index(7), Some(QueueId::from_raw(7)));
        assert_eq!(QueueId::from_index(u32::MAX as usize), Some(QueueId::from_raw(u32::MAX)));
        assert_eq!(QueueId::from_index(u32::MAX as usize + 1), None);
    }

    #[test]
    fn test_enqueue_idempotent() {
        let mut queue = LotteryQueue::new(true);
        assert!(queue.enqueue(t(1)));
        assert!(queue.enqueue(t(2)));
        assert!(!queue.enqueue(t(1)));
        assert_eq!(queue.waiters(), &[t(1), t(2)]);
    }

    #[test]
    fn test_remove() {
        let mut queue = LotteryQueue::new(false);
        queue.enqueue(t(1));
        queue.enqueue(t(2));

        assert!(!queue.remove(t(9)));
        assert!(queue.remove(t(1)));
        assert!(!queue.contains(t(1)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_donation_target() {
        let mut plain = LotteryQueue::new(false);
        plain.set_holder(Some(t(1)));
        assert_eq!(plain.holder(), Some(t(1)));
        assert_eq!(plain.donation_target(), None);

        let join = LotteryQueue::join(t(5));
        assert_eq!(join.kind(), QueueKind::Join);
        assert_eq!(join.donation_target(), Some(t(5)));
    }

    #[test]
    fn test_draw_empty() {
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(lottery_draw(&[], &mut rng), None);
    }

    #[test]
    #[should_panic(expected = "degenerate weight sum")]
    fn test_draw_zero_total() {
        let mut rng = SmallRng::seed_from_u64(3);
        lottery_draw(&[0, 0], &mut rng);
    }

    #[test]
    fn test_draw_skips_zero_span() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(lottery_draw(&[0, 4, 0], &mut rng), Some(1));
        }
    }

    #[test]
    fn test_draw_proportional() {
        let mut rng = SmallRng::seed_from_u64(25);
        let weights = [10, 20, 70];
        let mut wins = [0u32; 3];
        let rounds = 100_000;

        for _ in 0..rounds {
            let index = lottery_draw(&weights, &mut rng).unwrap();
            wins[index] += 1;
        }

        for (index, &weight) in weights.iter().enumerate() {
            let expected = weight as f64 / 100.0;
            let observed = f64::from(wins[index]) / f64::from(rounds);
            assert!(
                (observed - expected).abs() < 0.01,
                "waiter {}: observed {} expected {}",
                index,
                observed,
                expected
            );
        }
    }

    #[test]
    fn test_draw_large_tickets() {
        let mut rng = SmallRng::seed_from_u64(11);
        let weights = [u64::from(u32::MAX), u64::from(u32::MAX), 1];
        let mut third = 0;
        for _ in 0..1000 {
            if lottery_draw(&weights, &mut rng) == Some(2) {
                third += 1;
            }
        }
        assert!(third <= 1);
    }
}
