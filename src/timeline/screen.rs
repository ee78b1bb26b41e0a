//! What the timeline shows and what it accepts back
//!
//! Screens carry data only. Turning them into pixels is the job of
//! whatever sits on the participant side of the rendezvous.

use serde::{Deserialize, Serialize};

use crate::bets::BetVector;
use crate::content::{EvidenceMatrix, HintMatrix};
use crate::session::{LoopChoice, SurveyResponse};

/// Outcome announced on the quiz feedback page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizVerdict {
    /// Enough correct answers; betting starts next
    Passed,
    /// Too few correct answers; the instructions repeat
    Retry,
    /// Too few correct answers but no attempts left; betting starts anyway
    Proceed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BettingScreen {
    pub block: usize,
    pub num_blocks: usize,
    pub hint: usize,
    pub total_hints: usize,
    pub hint_state: HintMatrix,
    /// Evidence grids in slot order
    pub hypotheses: Vec<EvidenceMatrix>,
    /// Live slider values
    pub bets: BetVector,
    pub total: u32,
    /// Whether the submit control is enabled
    pub can_submit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackScreen {
    pub block: usize,
    pub num_blocks: usize,
    pub hint_state: HintMatrix,
    pub hypotheses: Vec<EvidenceMatrix>,
    /// Slot to highlight as the right answer
    pub correct_index: usize,
    pub bets: BetVector,
    pub block_bonus: f64,
    pub running_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Loading,
    Consent,
    Fullscreen,
    Instructions {
        page: usize,
        pages: usize,
    },
    ChipInstructions {
        step: u8,
    },
    Practice {
        bets: BetVector,
        total: u32,
        can_submit: bool,
    },
    RepeatOrQuiz,
    Quiz {
        question: usize,
        prompt: &'static str,
        options: &'static [&'static str],
    },
    QuizFeedback {
        correct: u32,
        questions: usize,
        verdict: QuizVerdict,
    },
    Betting(BettingScreen),
    Feedback(FeedbackScreen),
    FreeText {
        prompt: &'static str,
    },
    Survey,
    Debrief {
        running_total: f64,
    },
    /// The pool had nothing to lease
    Unavailable,
    /// Startup content could not be loaded
    LoadFailed {
        reason: String,
    },
}

/// Participant actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Input {
    /// Next-page style buttons
    Continue,
    Consent { agreed: bool },
    Choose { choice: LoopChoice },
    /// Option index on a quiz question
    Answer { option: usize },
    Slider { slot: usize, value: u32 },
    Submit,
    Text { text: String },
    Survey { response: SurveyResponse },
    /// Synthesized by the controller when a timed screen runs out
    DwellElapsed,
}
