//! # Scheduler Configuration
//!
//! Ticket bounds and construction-time options.

use crate::policy::Policy;
use crate::thread::Tickets;

// =============================================================================
// Ticket Bounds
// =============================================================================

/// Smallest ticket count a thread may hold
pub const PRIORITY_MINIMUM: Tickets = 1;

/// Largest ticket count a thread may hold
pub const PRIORITY_MAXIMUM: Tickets = Tickets::MAX;

/// Ticket count given to a thread the first time the scheduler sees it
pub const PRIORITY_DEFAULT: Tickets = 1;

static_assertions::const_assert!(PRIORITY_MINIMUM >= 1);
static_assertions::const_assert!(PRIORITY_MINIMUM <= PRIORITY_DEFAULT);
static_assertions::const_assert!(PRIORITY_DEFAULT <= PRIORITY_MAXIMUM);

/// Check whether `tickets` lies within `[PRIORITY_MINIMUM, PRIORITY_MAXIMUM]`
#[inline]
pub const fn in_range(tickets: Tickets) -> bool {
    tickets >= PRIORITY_MINIMUM && tickets <= PRIORITY_MAXIMUM
}

// =============================================================================
// Configuration
// =============================================================================

/// Seed used by [`LotteryConfig::default`]
pub const DEFAULT_SEED: u64 = 25;

/// Lottery scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotteryConfig {
    /// How donations fold together and how winners are chosen
    pub policy: Policy,
    /// Memoize effective weights between queries
    ///
    /// With caching off every query re-walks the donation graph.
    pub cache_weights: bool,
    /// Seed for the built-in random source
    pub seed: u64,
}

impl LotteryConfig {
    /// Default configuration: additive lottery, caching on
    pub const fn new() -> Self {
        Self {
            policy: Policy::Lottery,
            cache_weights: true,
            seed: DEFAULT_SEED,
        }
    }

    /// Select the weighting policy
    pub const fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable effective-weight memoization
    pub const fn with_cache(mut self, cache_weights: bool) -> Self {
        self.cache_weights = cache_weights;
        self
    }

    /// Set the seed of the built-in random source
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self::new()
    }
}
