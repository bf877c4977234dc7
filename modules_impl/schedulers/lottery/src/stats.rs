//! Scheduler counters.

/// Statistics for a lottery scheduler instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// Draws that produced a winner
    pub draws: u64,
    /// Draws attempted on an empty waiting set
    pub empty_draws: u64,
    /// Effective weights computed from the donation graph
    pub weight_recomputations: u64,
    /// Effective weights served from cache
    pub cache_hits: u64,
    /// Donation cycles hit during weight computation
    pub cycles_detected: u64,
    /// Cached effective weights thrown away after a graph change
    pub invalidations: u64,
}

impl SchedStats {
    /// Zero every counter
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
