//! Mutable state threaded through every trial of one session

use crate::bets::BetVector;
use crate::bonus::BonusLedger;
use crate::session::{SurveyResponse, TrialEntry};

/// Session state owned by the controller and handed to each trial by value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    /// Current block, 0-based
    pub block: usize,
    /// Current hint within the block, 0-based
    pub hint: usize,
    /// Last submitted bet vector; prior for the next hint of the block
    pub last_bets: BetVector,
    /// Slider values on the screen right now
    pub live_bets: BetVector,
    pub ledger: BonusLedger,
    /// Times the participant chose to see the instructions again
    pub instruction_loops: u32,
    /// Times the quiz feedback page has been entered
    pub quiz_loops: u32,
    /// Correct answers in the current quiz round
    pub quiz_correct: u32,
    /// Instruction page being shown
    pub page: usize,
    pub free_text: Option<String>,
    pub survey: Option<SurveyResponse>,
    /// Completed trials in presentation order
    pub history: Vec<TrialEntry>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }
}
