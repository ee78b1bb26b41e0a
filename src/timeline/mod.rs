//! Trial sequencing for one participant session
//!
//! A session walks a fixed list of trials: consent, an instruction loop
//! with a practice bet, a comprehension quiz that can send the participant
//! back to the instructions, the betting blocks with per-block feedback,
//! and a closing survey. `TimelineController` owns the list and a cursor,
//! threads a `SessionContext` through every trial, and talks to the
//! participant over a single-slot `Rendezvous`.
//!
//! ## Lease lifecycle
//!
//! - pool exhausted: nothing to release
//! - content unusable after a successful allocation: released, not completed
//! - participant gone mid-session: released, not completed
//! - survey answered: payload handed to the sink, then released as completed

mod context;
mod controller;
mod rendezvous;
mod screen;
mod sequence;
mod trial;

pub use context::SessionContext;
pub use controller::TimelineController;
pub use rendezvous::{rendezvous, Disconnected, ParticipantHandle, Rendezvous};
pub use screen::{BettingScreen, FeedbackScreen, Input, QuizVerdict, Screen};
pub use sequence::Timeline;
pub use trial::{
    Outcome, QuizQuestion, Transition, Trial, TrialEnv, TrialHandler, CHIP_STEPS,
    FREE_TEXT_PROMPT, INSTRUCTION_PAGES, QUIZ,
};

use crate::session::SessionPayload;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    #[error("Block {block} is not part of the loaded content")]
    UnknownBlock { block: usize },

    #[error("Block {block} has no hint {hint}")]
    UnknownHint { block: usize, hint: usize },

    #[error("No quiz question {question}")]
    UnknownQuestion { question: usize },
}

/// How a session ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Survey answered; `delivered` tells whether the sink accepted the payload
    Completed {
        payload: Box<SessionPayload>,
        delivered: bool,
    },
    /// The pool had no eligible condition
    Unavailable,
    /// Startup content could not be fetched or did not validate
    LoadFailed { reason: String },
    /// The participant left before the end
    Abandoned {
        condition_id: Option<i64>,
        trials_completed: usize,
    },
}

impl SessionOutcome {
    pub fn payload(&self) -> Option<&SessionPayload> {
        match self {
            SessionOutcome::Completed { payload, .. } => Some(payload),
            _ => None,
        }
    }
}
