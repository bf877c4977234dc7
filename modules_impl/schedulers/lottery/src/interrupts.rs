//! # Critical Sections
//!
//! The scheduler core does no locking of its own. Every public operation
//! must run with preemption excluded, and the core checks that through
//! [`InterruptControl`] before touching any state.
//!
//! [`SoftInterrupts`] is a software interrupt-enable flag for cooperative
//! runtimes and hosted tests. Kernels wire their architecture's
//! interrupt state in instead.

use core::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// Critical-Section Provider
// =============================================================================

/// Source of truth for "the caller holds the scheduler critical section"
pub trait InterruptControl {
    /// Whether interrupts are currently disabled on this CPU
    fn interrupts_disabled(&self) -> bool;
}

impl<T: InterruptControl + ?Sized> InterruptControl for &T {
    fn interrupts_disabled(&self) -> bool {
        (**self).interrupts_disabled()
    }
}

/// Exclusion provided by a held lock rather than by interrupt state
///
/// Used by [`crate::SharedScheduler`], where owning the mutex guard is the
/// critical section.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockHeld;

impl InterruptControl for LockHeld {
    fn interrupts_disabled(&self) -> bool {
        true
    }
}

// =============================================================================
// Software Interrupt Flag
// =============================================================================

/// Software interrupt-enable flag
#[derive(Debug)]
pub struct SoftInterrupts {
    enabled: AtomicBool,
}

impl SoftInterrupts {
    /// Create a flag with interrupts enabled
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    /// Check if interrupts are enabled
    #[inline]
    pub fn are_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Disable interrupts, returning whether they were enabled before
    #[inline]
    pub fn disable(&self) -> bool {
        self.enabled.swap(false, Ordering::SeqCst)
    }

    /// Enable interrupts
    #[inline]
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Disable interrupts until the returned guard is dropped
    pub fn guard(&self) -> InterruptGuard<'_> {
        InterruptGuard {
            irq: self,
            was_enabled: self.disable(),
        }
    }

    /// Execute a closure with interrupts disabled
    ///
    /// Restores the previous interrupt state after the closure returns.
    pub fn without_interrupts<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.guard();
        f()
    }
}

impl Default for SoftInterrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptControl for SoftInterrupts {
    fn interrupts_disabled(&self) -> bool {
        !self.are_enabled()
    }
}

/// RAII guard for interrupt state
///
/// Disables interrupts when created, restores previous state when dropped.
#[derive(Debug)]
pub struct InterruptGuard<'a> {
    irq: &'a SoftInterrupts,
    /// Whether interrupts were enabled before this guard was created
    was_enabled: bool,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.irq.enable();
        }
    }
}
