//! Bonus accumulation
//!
//! A fixed budget is split evenly across the blocks of a condition, and each
//! block's share is split evenly across its hints. A trial pays its share
//! scaled by the fraction of chips placed on the correct hypothesis.

use serde::{Deserialize, Serialize};

use crate::bets::BetVector;

/// Per-block bonus cap derived from the experiment budget
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusSchedule {
    pub max_block_bonus: f64,
}

impl BonusSchedule {
    pub fn new(budget: f64, num_blocks: usize) -> Self {
        let max_block_bonus = if num_blocks == 0 {
            0.0
        } else {
            budget / num_blocks as f64
        };
        Self { max_block_bonus }
    }

    pub fn max_trial_bonus(&self, hints_in_block: usize) -> f64 {
        if hints_in_block == 0 {
            return 0.0;
        }
        self.max_block_bonus / hints_in_block as f64
    }

    /// Bonus for one submitted bet. The all-zero fallback is applied here as
    /// well, so callers may pass the raw submission.
    pub fn trial_bonus(&self, bets: &BetVector, hints_in_block: usize, correct_index: usize) -> f64 {
        let bets = if bets.is_all_zero() {
            BetVector::uniform()
        } else {
            *bets
        };
        let share = bets.fractions().get(correct_index).copied().unwrap_or(0.0);
        self.max_trial_bonus(hints_in_block) * share
    }
}

/// Running bonus state of one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BonusLedger {
    /// Accumulated over the current block
    pub block: f64,
    /// Accumulated over the whole session; never reset
    pub running: f64,
}

impl BonusLedger {
    pub fn record(&mut self, trial_bonus: f64) {
        self.block += trial_bonus;
        self.running += trial_bonus;
    }

    pub fn start_block(&mut self) {
        self.block = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_two_hint_block() {
        let schedule = BonusSchedule::new(0.25, 2);
        assert!((schedule.max_block_bonus - 0.125).abs() < EPS);

        let first = schedule.trial_bonus(&BetVector([100, 0, 0, 0]), 2, 0);
        let second = schedule.trial_bonus(&BetVector([50, 50, 0, 0]), 2, 0);
        assert!((first - 0.0625).abs() < EPS);
        assert!((second - 0.03125).abs() < EPS);

        let mut ledger = BonusLedger::default();
        ledger.record(first);
        ledger.record(second);
        assert!((ledger.block - 0.09375).abs() < EPS);

        ledger.start_block();
        assert_eq!(ledger.block, 0.0);
        assert!((ledger.running - 0.09375).abs() < EPS);
    }

    #[test]
    fn test_correct_index_selects_slot() {
        let schedule = BonusSchedule::new(1.0, 1);
        let bets = BetVector([10, 20, 30, 40]);
        assert!((schedule.trial_bonus(&bets, 1, 3) - 0.4).abs() < EPS);
        assert!((schedule.trial_bonus(&bets, 1, 0) - 0.1).abs() < EPS);
    }

    #[test]
    fn test_zero_bets_pay_uniform_share() {
        let schedule = BonusSchedule::new(1.0, 1);
        let bonus = schedule.trial_bonus(&BetVector([0, 0, 0, 0]), 1, 2);
        assert!((bonus - 0.25).abs() < EPS);
    }

    #[test]
    fn test_block_bonus_bounded_by_cap() {
        let schedule = BonusSchedule::new(5.0, 40);
        let mut ledger = BonusLedger::default();
        for _ in 0..3 {
            ledger.record(schedule.trial_bonus(&BetVector([100, 0, 0, 0]), 3, 0));
        }
        assert!(ledger.block <= schedule.max_block_bonus + EPS);
        assert!((ledger.block - schedule.max_block_bonus).abs() < EPS);
    }

    #[test]
    fn test_empty_schedule() {
        let schedule = BonusSchedule::new(5.0, 0);
        assert_eq!(schedule.max_block_bonus, 0.0);
        assert_eq!(schedule.max_trial_bonus(0), 0.0);
    }
}
