//! # Scheduling Policies
//!
//! The scheduler supports two policies, fixed at construction:
//!
//! | Policy | Donation | Selection |
//! |--------|----------|-----------|
//! | `Lottery` | donors' tickets add to the holder | weighted random draw |
//! | `Priority` | holder inherits the maximum donor | highest weight, oldest first |

use rand::RngCore;

use crate::queue::lottery_draw;

/// Weighting and selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Additive ticket donation, proportional random selection
    #[default]
    Lottery,
    /// Max-based priority inheritance, deterministic selection
    Priority,
}

impl Policy {
    /// Fold one donor's effective weight into a running total
    #[inline]
    pub fn fold(self, acc: u64, donated: u64) -> u64 {
        match self {
            Policy::Lottery => acc.saturating_add(donated),
            Policy::Priority => acc.max(donated),
        }
    }

    /// Choose an index into `weights`, or `None` when empty
    ///
    /// `weights` is in queue iteration order.
    pub fn select<R: RngCore>(self, weights: &[u64], rng: &mut R) -> Option<usize> {
        match self {
            Policy::Lottery => lottery_draw(weights, rng),
            Policy::Priority => {
                let mut best: Option<(usize, u64)> = None;
                for (index, &weight) in weights.iter().enumerate() {
                    match best {
                        Some((_, top)) if top >= weight => {},
                        _ => best = Some((index, weight)),
                    }
                }
                best.map(|(index, _)| index)
            },
        }
    }
}
