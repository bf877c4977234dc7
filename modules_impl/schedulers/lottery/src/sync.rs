//! # Shared Scheduler
//!
//! A scheduler behind a spinlock, for runtimes where several CPUs or
//! cooperative executors reach the same run queues. Holding the lock is the
//! critical section.

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use spin::Mutex;

use crate::config::LotteryConfig;
use crate::interrupts::LockHeld;
use crate::scheduler::{DefaultRng, LotteryScheduler};

/// Spin-locked lottery scheduler
#[derive(Debug)]
pub struct SharedScheduler<R = DefaultRng> {
    inner: Mutex<LotteryScheduler<R, LockHeld>>,
}

impl SharedScheduler<DefaultRng> {
    /// Create a shared scheduler seeded from `config.seed`
    pub fn with_seed(config: LotteryConfig) -> Self {
        Self::new(config, SmallRng::seed_from_u64(config.seed))
    }
}

impl<R: RngCore> SharedScheduler<R> {
    /// Create a shared scheduler drawing from `rng`
    pub fn new(config: LotteryConfig, rng: R) -> Self {
        Self {
            inner: Mutex::new(LotteryScheduler::new(config, rng, LockHeld)),
        }
    }

    /// Run `f` with exclusive access to the scheduler
    ///
    /// Compound operations (compute weights, then draw) must stay inside a
    /// single call.
    pub fn with<T>(&self, f: impl FnOnce(&mut LotteryScheduler<R, LockHeld>) -> T) -> T {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Like [`with`](Self::with), but gives up if the lock is contended
    pub fn try_with<T>(&self, f: impl FnOnce(&mut LotteryScheduler<R, LockHeld>) -> T) -> Option<T> {
        let mut guard = self.inner.try_lock()?;
        Some(f(&mut guard))
    }

    /// Unwrap the scheduler
    pub fn into_inner(self) -> LotteryScheduler<R, LockHeld> {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ThreadId;

    #[test]
    fn test_with_runs_locked() {
        let shared = SharedScheduler::with_seed(LotteryConfig::default());
        let lock = shared.with(|sched| sched.new_queue(true).unwrap());

        shared.with(|sched| {
            sched.acquire(lock, ThreadId::new(1)).unwrap();
            sched.set_base_weight(ThreadId::new(2), 9).unwrap();
            sched.wait_for_access(lock, ThreadId::new(2)).unwrap();
        });

        assert_eq!(shared.with(|sched| sched.effective_weight(ThreadId::new(1))), 10);
    }

    #[test]
    fn test_try_with_contended() {
        let shared = SharedScheduler::with_seed(LotteryConfig::default());
        let nested = shared.with(|_| shared.try_with(|_| ()));
        assert!(nested.is_none());
        assert_eq!(shared.try_with(|_| 5), Some(5));
    }

    #[test]
    fn test_concurrent_waiters() {
        let shared = SharedScheduler::with_seed(LotteryConfig::default());
        let ready = shared.with(|sched| sched.new_queue(false).unwrap());

        std::thread::scope(|scope| {
            for worker in 0..4u64 {
                let shared = &shared;
                scope.spawn(move || {
                    for i in 0..25 {
                        let id = ThreadId::new(worker * 100 + i);
                        shared.with(|sched| sched.wait_for_access(ready, id).unwrap());
                    }
                });
            }
        });

        let mut sched = shared.into_inner();
        assert_eq!(sched.waiters(ready).unwrap().len(), 100);

        let mut drawn = 0;
        while sched.pick_next(ready).unwrap().is_some() {
            drawn += 1;
        }
        assert_eq!(drawn, 100);
    }
}
