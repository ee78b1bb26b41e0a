//! Chip allocations across the four hypothesis slots

use serde::{Deserialize, Serialize};

use crate::content::HYPOTHESIS_COUNT;

/// Chips a participant distributes on every betting trial
pub const CHIP_TOTAL: u32 = 100;

/// Bets in the block's hypothesis slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BetVector(pub [u32; HYPOTHESIS_COUNT]);

impl BetVector {
    /// 25 chips on every slot
    pub const fn uniform() -> Self {
        Self([CHIP_TOTAL / HYPOTHESIS_COUNT as u32; HYPOTHESIS_COUNT])
    }

    pub fn sum(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Move one slider. Values above the chip total are clamped; unknown
    /// slots are ignored.
    pub fn set(&mut self, slot: usize, value: u32) {
        if let Some(bet) = self.0.get_mut(slot) {
            *bet = value.min(CHIP_TOTAL);
        }
    }

    /// Whether the submit control is enabled for this vector.
    pub fn can_submit(&self) -> bool {
        self.sum() == CHIP_TOTAL || self.is_all_zero()
    }

    /// The vector stored when the participant submits, or `None` while
    /// submission is disabled. An all-zero vector becomes uniform.
    pub fn finalize(&self) -> Option<BetVector> {
        if self.is_all_zero() {
            Some(Self::uniform())
        } else if self.sum() == CHIP_TOTAL {
            Some(*self)
        } else {
            None
        }
    }

    /// Each slot as a share of the vector's own total.
    pub fn fractions(&self) -> [f64; HYPOTHESIS_COUNT] {
        let total = self.sum();
        let mut out = [0.0; HYPOTHESIS_COUNT];
        if total == 0 {
            return out;
        }
        for (share, &bet) in out.iter_mut().zip(self.0.iter()) {
            *share = bet as f64 / total as f64;
        }
        out
    }
}

impl Default for BetVector {
    fn default() -> Self {
        Self::uniform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sums_to_total() {
        assert_eq!(BetVector::uniform().0, [25, 25, 25, 25]);
        assert_eq!(BetVector::uniform().sum(), CHIP_TOTAL);
    }

    #[test]
    fn test_zero_vector_finalizes_to_uniform() {
        let zero = BetVector([0, 0, 0, 0]);
        assert!(zero.can_submit());
        assert_eq!(zero.finalize(), Some(BetVector::uniform()));
    }

    #[test]
    fn test_partial_sum_cannot_submit() {
        let mut bets = BetVector::uniform();
        bets.set(0, 40);
        assert_eq!(bets.sum(), 115);
        assert!(!bets.can_submit());
        assert_eq!(bets.finalize(), None);

        bets.set(1, 10);
        assert_eq!(bets.finalize(), Some(BetVector([40, 10, 25, 25])));
    }

    #[test]
    fn test_set_clamps_and_ignores_bad_slot() {
        let mut bets = BetVector([0, 0, 0, 0]);
        bets.set(2, 250);
        bets.set(9, 5);
        assert_eq!(bets.0, [0, 0, 100, 0]);
    }

    #[test]
    fn test_fractions() {
        let f = BetVector([50, 50, 0, 0]).fractions();
        assert_eq!(f, [0.5, 0.5, 0.0, 0.0]);
        assert_eq!(BetVector([0, 0, 0, 0]).fractions(), [0.0; 4]);
    }
}
