//! Trial kinds and what each does with input
//!
//! `Trial` is a closed set. Every variant renders a `Screen` from the
//! current context and folds participant input back into a new context,
//! reporting either `Pending` (stay on this trial) or `Complete` with the
//! record it contributes to the session.

use std::time::Duration;

use tracing::debug;

use super::context::SessionContext;
use super::screen::{BettingScreen, FeedbackScreen, Input, QuizVerdict, Screen};
use super::TimelineError;
use crate::bets::BetVector;
use crate::bonus::BonusSchedule;
use crate::config::ExperimentConfig;
use crate::content::{BlockSpec, StudyContent};
use crate::session::{LoopChoice, TrialRecord};

/// Pages in the main instruction sequence
pub const INSTRUCTION_PAGES: usize = 7;

/// Steps of the chip-allocation walkthrough
pub const CHIP_STEPS: u8 = 4;

pub const FREE_TEXT_PROMPT: &str =
    "In a few words, describe how you decided where to place your chips.";

pub struct QuizQuestion {
    pub prompt: &'static str,
    pub options: &'static [&'static str],
    /// Index into `options` of the right answer
    pub expected: usize,
}

/// Comprehension check shown after the instructions
pub static QUIZ: [QuizQuestion; 3] = [
    QuizQuestion {
        prompt: "What determines the size of your bonus on each round?",
        options: &[
            "The share of chips placed on the correct grid",
            "The number of tiles revealed",
            "How quickly you submit",
            "The total number of chips you place",
        ],
        expected: 0,
    },
    QuizQuestion {
        prompt: "Which of these statements about the hints are true?",
        options: &[
            "Hints are chosen at random",
            "Hints are picked by someone who knows the answer",
            "Every hint is consistent with the correct grid",
            "Hints are chosen to mislead you",
            "Both the second and third statements",
        ],
        expected: 4,
    },
    QuizQuestion {
        prompt: "What happens to your chips between hints of the same problem?",
        options: &[
            "They reset to an even split",
            "They carry over from your last submission",
            "You may move them freely before submitting",
            "All of the above except the first",
        ],
        expected: 3,
    },
];

/// Read-only inputs shared by every trial of a session
pub struct TrialEnv<'a> {
    pub content: &'a StudyContent,
    pub schedule: BonusSchedule,
    pub pass_threshold: u32,
    pub max_quiz_loops: u32,
    pub feedback_dwell: Duration,
}

impl<'a> TrialEnv<'a> {
    pub fn new(content: &'a StudyContent, experiment: &ExperimentConfig) -> Self {
        Self {
            content,
            schedule: BonusSchedule::new(experiment.bonus_budget, content.block_count()),
            pass_threshold: experiment.pass_threshold,
            max_quiz_loops: experiment.max_quiz_loops,
            feedback_dwell: experiment.feedback_dwell(),
        }
    }

    /// Whether the quiz feedback page sends the participant back to the
    /// instructions.
    pub fn repeats_intro(&self, ctx: &SessionContext) -> bool {
        ctx.quiz_correct < self.pass_threshold && ctx.quiz_loops < self.max_quiz_loops
    }

    fn quiz_verdict(&self, ctx: &SessionContext) -> QuizVerdict {
        if ctx.quiz_correct >= self.pass_threshold {
            QuizVerdict::Passed
        } else if self.repeats_intro(ctx) {
            QuizVerdict::Retry
        } else {
            QuizVerdict::Proceed
        }
    }

    fn block(&self, block: usize) -> Result<&'a BlockSpec, TimelineError> {
        self.content
            .block(block)
            .ok_or(TimelineError::UnknownBlock { block })
    }

    fn correct_index(&self, block: usize) -> Result<usize, TimelineError> {
        self.content
            .correct_index(block)
            .ok_or(TimelineError::UnknownBlock { block })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pending,
    Complete(TrialRecord),
}

/// Result of feeding one input to a trial
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub ctx: SessionContext,
    pub outcome: Outcome,
}

impl Transition {
    fn pending(ctx: SessionContext) -> Self {
        Self {
            ctx,
            outcome: Outcome::Pending,
        }
    }

    fn complete(ctx: SessionContext, record: TrialRecord) -> Self {
        Self {
            ctx,
            outcome: Outcome::Complete(record),
        }
    }
}

/// Behavior shared by all trial kinds.
pub trait TrialHandler {
    /// Prepare the context when the trial starts.
    fn enter(&self, _env: &TrialEnv<'_>, ctx: SessionContext) -> SessionContext {
        ctx
    }

    fn render(&self, env: &TrialEnv<'_>, ctx: &SessionContext) -> Result<Screen, TimelineError>;

    fn compute_result(
        &self,
        env: &TrialEnv<'_>,
        ctx: SessionContext,
        input: Input,
    ) -> Result<Transition, TimelineError>;

    /// Time the screen stays up when the trial does not wait for input.
    fn dwell(&self, _env: &TrialEnv<'_>) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trial {
    Consent,
    Fullscreen,
    Instructions { pages: usize },
    ChipInstructions { step: u8 },
    Practice,
    RepeatOrQuiz,
    Quiz { question: usize },
    QuizFeedback,
    Betting { block: usize, hint: usize },
    Feedback { block: usize },
    FreeTextCheck,
    Survey,
    Debrief,
}

/// Apply a slider move or a submit to the live bets.
///
/// Returns the finalized vector on an accepted submit.
fn adjust_bets(ctx: &mut SessionContext, input: Input) -> Option<BetVector> {
    match input {
        Input::Slider { slot, value } => {
            ctx.live_bets.set(slot, value);
            None
        }
        Input::Submit => {
            let accepted = ctx.live_bets.finalize();
            if accepted.is_none() {
                debug!(total = ctx.live_bets.sum(), "Submit ignored");
            }
            accepted
        }
        _ => None,
    }
}

impl TrialHandler for Trial {
    fn enter(&self, _env: &TrialEnv<'_>, mut ctx: SessionContext) -> SessionContext {
        match *self {
            Trial::Instructions { .. } => ctx.page = 0,
            Trial::Practice => ctx.live_bets = BetVector::uniform(),
            Trial::QuizFeedback => ctx.quiz_loops += 1,
            Trial::Betting { block, hint } => {
                ctx.block = block;
                ctx.hint = hint;
                if hint == 0 {
                    ctx.ledger.start_block();
                    ctx.live_bets = BetVector::uniform();
                } else {
                    ctx.live_bets = ctx.last_bets;
                }
            }
            _ => {}
        }
        ctx
    }

    fn render(&self, env: &TrialEnv<'_>, ctx: &SessionContext) -> Result<Screen, TimelineError> {
        let screen = match *self {
            Trial::Consent => Screen::Consent,
            Trial::Fullscreen => Screen::Fullscreen,
            Trial::Instructions { pages } => Screen::Instructions {
                page: ctx.page,
                pages,
            },
            Trial::ChipInstructions { step } => Screen::ChipInstructions { step },
            Trial::Practice => Screen::Practice {
                bets: ctx.live_bets,
                total: ctx.live_bets.sum(),
                can_submit: ctx.live_bets.can_submit(),
            },
            Trial::RepeatOrQuiz => Screen::RepeatOrQuiz,
            Trial::Quiz { question } => {
                let q = QUIZ
                    .get(question)
                    .ok_or(TimelineError::UnknownQuestion { question })?;
                Screen::Quiz {
                    question,
                    prompt: q.prompt,
                    options: q.options,
                }
            }
            Trial::QuizFeedback => Screen::QuizFeedback {
                correct: ctx.quiz_correct,
                questions: QUIZ.len(),
                verdict: env.quiz_verdict(ctx),
            },
            Trial::Betting { block, hint } => {
                let spec = env.block(block)?;
                let hint_state = spec
                    .states
                    .get(hint)
                    .cloned()
                    .ok_or(TimelineError::UnknownHint { block, hint })?;
                Screen::Betting(BettingScreen {
                    block,
                    num_blocks: env.content.block_count(),
                    hint,
                    total_hints: spec.hint_count(),
                    hint_state,
                    hypotheses: env.content.hypotheses(block),
                    bets: ctx.live_bets,
                    total: ctx.live_bets.sum(),
                    can_submit: ctx.live_bets.can_submit(),
                })
            }
            Trial::Feedback { block } => {
                let spec = env.block(block)?;
                let hint_state = spec
                    .states
                    .last()
                    .cloned()
                    .ok_or(TimelineError::UnknownHint { block, hint: 0 })?;
                Screen::Feedback(FeedbackScreen {
                    block,
                    num_blocks: env.content.block_count(),
                    hint_state,
                    hypotheses: env.content.hypotheses(block),
                    correct_index: env.correct_index(block)?,
                    bets: ctx.last_bets,
                    block_bonus: ctx.ledger.block,
                    running_total: ctx.ledger.running,
                })
            }
            Trial::FreeTextCheck => Screen::FreeText {
                prompt: FREE_TEXT_PROMPT,
            },
            Trial::Survey => Screen::Survey,
            Trial::Debrief => Screen::Debrief {
                running_total: ctx.ledger.running,
            },
        };
        Ok(screen)
    }

    fn compute_result(
        &self,
        env: &TrialEnv<'_>,
        mut ctx: SessionContext,
        input: Input,
    ) -> Result<Transition, TimelineError> {
        let transition = match (*self, input) {
            (Trial::Consent, Input::Consent { agreed: true }) => {
                Transition::complete(ctx, TrialRecord::Consent { agreed: true })
            }
            (Trial::Fullscreen, Input::Continue) => {
                Transition::complete(ctx, TrialRecord::Fullscreen)
            }
            (Trial::Instructions { pages }, Input::Continue) => {
                ctx.page += 1;
                if ctx.page >= pages {
                    Transition::complete(ctx, TrialRecord::Instructions { pages })
                } else {
                    Transition::pending(ctx)
                }
            }
            (Trial::ChipInstructions { step }, Input::Continue) => {
                Transition::complete(ctx, TrialRecord::ChipInstructions { step })
            }
            (Trial::Practice, input) => match adjust_bets(&mut ctx, input) {
                Some(bets) => {
                    ctx.live_bets = bets;
                    Transition::complete(ctx, TrialRecord::Practice { bets })
                }
                None => Transition::pending(ctx),
            },
            (Trial::RepeatOrQuiz, Input::Choose { choice }) => {
                match choice {
                    LoopChoice::RepeatInstructions => ctx.instruction_loops += 1,
                    LoopChoice::TakeQuiz => ctx.quiz_correct = 0,
                }
                Transition::complete(ctx, TrialRecord::LoopChoice { choice })
            }
            (Trial::Quiz { question }, Input::Answer { option }) => {
                let q = QUIZ
                    .get(question)
                    .ok_or(TimelineError::UnknownQuestion { question })?;
                let correct = option == q.expected;
                if correct {
                    ctx.quiz_correct += 1;
                }
                Transition::complete(
                    ctx,
                    TrialRecord::QuizAnswer {
                        question,
                        answer: option,
                        correct,
                    },
                )
            }
            (Trial::QuizFeedback, Input::Continue) => {
                let record = TrialRecord::QuizFeedback {
                    correct: ctx.quiz_correct,
                    quiz_loops: ctx.quiz_loops,
                };
                Transition::complete(ctx, record)
            }
            (Trial::Betting { block, hint }, input) => match adjust_bets(&mut ctx, input) {
                Some(bets) => {
                    let spec = env.block(block)?;
                    let bonus =
                        env.schedule
                            .trial_bonus(&bets, spec.hint_count(), env.correct_index(block)?);
                    ctx.ledger.record(bonus);
                    ctx.last_bets = bets;
                    ctx.live_bets = bets;
                    debug!(block, hint, bonus, block_bonus = ctx.ledger.block, "Bet submitted");
                    Transition::complete(
                        ctx,
                        TrialRecord::Bet {
                            block,
                            hint,
                            teacher: spec.teacher.clone(),
                            problem: spec.problem.clone(),
                            bets,
                            bonus,
                        },
                    )
                }
                None => Transition::pending(ctx),
            },
            (Trial::Feedback { block }, Input::DwellElapsed) => {
                let record = TrialRecord::Feedback {
                    block,
                    bets: ctx.last_bets,
                    block_bonus: ctx.ledger.block,
                    running_total: ctx.ledger.running,
                };
                ctx.ledger.start_block();
                Transition::complete(ctx, record)
            }
            (Trial::FreeTextCheck, Input::Text { text }) if !text.trim().is_empty() => {
                ctx.free_text = Some(text.clone());
                Transition::complete(ctx, TrialRecord::FreeText { text })
            }
            (Trial::Survey, Input::Survey { response }) => {
                ctx.survey = Some(response.clone());
                Transition::complete(ctx, TrialRecord::Survey { response })
            }
            (Trial::Debrief, Input::DwellElapsed) => Transition::complete(ctx, TrialRecord::Debrief),
            (trial, input) => {
                debug!(?trial, ?input, "Input ignored");
                Transition::pending(ctx)
            }
        };
        Ok(transition)
    }

    fn dwell(&self, env: &TrialEnv<'_>) -> Option<Duration> {
        match self {
            Trial::Feedback { .. } => Some(env.feedback_dwell),
            Trial::Debrief => Some(Duration::ZERO),
            _ => None,
        }
    }
}
