//! Scripted participant
//!
//! Plays the participant side of a rendezvous from a fixed script. Used by
//! the `simulate` command and by the session tests.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::bets::BetVector;
use crate::session::{LoopChoice, SurveyResponse};
use crate::timeline::{
    rendezvous, FeedbackScreen, Input, ParticipantHandle, Screen, SessionOutcome,
    TimelineController, TimelineError, QUIZ,
};

/// What the participant will do at each decision point.
#[derive(Debug, Clone)]
pub struct Script {
    /// Answers per quiz round; rounds past the end answer correctly
    quiz_rounds: Vec<[usize; 3]>,
    /// Choices at the repeat-or-quiz prompt; once exhausted, take the quiz
    loop_choices: VecDeque<LoopChoice>,
    practice: BetVector,
    bets: HashMap<(usize, usize), BetVector>,
    default_bets: BetVector,
    free_text: String,
    survey: SurveyResponse,
    /// Drop the handle after this many screens
    leave_after: Option<usize>,
    /// Send every submit twice, as a double click would
    double_submit: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            quiz_rounds: Vec::new(),
            loop_choices: VecDeque::new(),
            practice: BetVector::uniform(),
            bets: HashMap::new(),
            default_bets: BetVector::uniform(),
            free_text: "I followed the hints.".to_string(),
            survey: SurveyResponse::default(),
            leave_after: None,
            double_submit: false,
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quiz_round(mut self, answers: [usize; 3]) -> Self {
        self.quiz_rounds.push(answers);
        self
    }

    pub fn choose(mut self, choice: LoopChoice) -> Self {
        self.loop_choices.push_back(choice);
        self
    }

    pub fn practice(mut self, bets: BetVector) -> Self {
        self.practice = bets;
        self
    }

    /// Bets for one (block, hint). Vectors that cannot be submitted are
    /// replaced by an even split.
    pub fn bet(mut self, block: usize, hint: usize, bets: BetVector) -> Self {
        self.bets.insert((block, hint), bets);
        self
    }

    pub fn default_bets(mut self, bets: BetVector) -> Self {
        self.default_bets = bets;
        self
    }

    pub fn free_text(mut self, text: impl Into<String>) -> Self {
        self.free_text = text.into();
        self
    }

    pub fn survey(mut self, survey: SurveyResponse) -> Self {
        self.survey = survey;
        self
    }

    pub fn leave_after(mut self, screens: usize) -> Self {
        self.leave_after = Some(screens);
        self
    }

    pub fn double_submit(mut self) -> Self {
        self.double_submit = true;
        self
    }
}

/// Every screen the participant saw, in order
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub screens: Vec<Screen>,
    pub left_early: bool,
}

impl Transcript {
    pub fn feedback(&self) -> Vec<&FeedbackScreen> {
        self.screens
            .iter()
            .filter_map(|s| match s {
                Screen::Feedback(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Screen) -> bool) -> usize {
        self.screens.iter().filter(|s| pred(s)).count()
    }

    pub fn last(&self) -> Option<&Screen> {
        self.screens.last()
    }
}

/// Move the live bets one slider at a time toward `target`, then submit.
fn steer(current: &BetVector, target: BetVector) -> Input {
    let target = if target.can_submit() {
        target
    } else {
        BetVector::uniform()
    };
    match (0..target.0.len()).find(|&slot| current.0[slot] != target.0[slot]) {
        Some(slot) => Input::Slider {
            slot,
            value: target.0[slot],
        },
        None => Input::Submit,
    }
}

pub struct ScriptedParticipant {
    script: Script,
    quiz_round: usize,
}

impl ScriptedParticipant {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            quiz_round: 0,
        }
    }

    fn respond(&mut self, screen: &Screen) -> Option<Input> {
        let input = match screen {
            Screen::Consent => Input::Consent { agreed: true },
            Screen::Fullscreen | Screen::Instructions { .. } | Screen::ChipInstructions { .. } => {
                Input::Continue
            }
            Screen::Practice { bets, .. } => steer(bets, self.script.practice),
            Screen::RepeatOrQuiz => Input::Choose {
                choice: self
                    .script
                    .loop_choices
                    .pop_front()
                    .unwrap_or(LoopChoice::TakeQuiz),
            },
            Screen::Quiz { question, .. } => {
                let expected = QUIZ.get(*question).map(|q| q.expected).unwrap_or(0);
                let option = self
                    .script
                    .quiz_rounds
                    .get(self.quiz_round)
                    .and_then(|round| round.get(*question).copied())
                    .unwrap_or(expected);
                Input::Answer { option }
            }
            Screen::QuizFeedback { .. } => {
                self.quiz_round += 1;
                Input::Continue
            }
            Screen::Betting(betting) => {
                let target = self
                    .script
                    .bets
                    .get(&(betting.block, betting.hint))
                    .copied()
                    .unwrap_or(self.script.default_bets);
                steer(&betting.bets, target)
            }
            Screen::FreeText { .. } => Input::Text {
                text: self.script.free_text.clone(),
            },
            Screen::Survey => Input::Survey {
                response: self.script.survey.clone(),
            },
            Screen::Loading
            | Screen::Feedback(_)
            | Screen::Debrief { .. }
            | Screen::Unavailable
            | Screen::LoadFailed { .. } => return None,
        };
        Some(input)
    }

    /// Answer screens until the controller hangs up or the script leaves.
    pub async fn run(mut self, mut handle: ParticipantHandle) -> Transcript {
        let mut transcript = Transcript::default();

        while let Some(screen) = handle.next_screen().await {
            transcript.screens.push(screen.clone());

            if let Some(limit) = self.script.leave_after {
                if transcript.screens.len() >= limit {
                    debug!(screens = limit, "Participant leaving");
                    transcript.left_early = true;
                    break;
                }
            }

            if let Some(input) = self.respond(&screen) {
                let repeat = self.script.double_submit && input == Input::Submit;
                if handle.send(input).await.is_err() {
                    break;
                }
                if repeat && handle.send(Input::Submit).await.is_err() {
                    break;
                }
            }
        }

        transcript
    }
}

/// Run one session with a scripted participant on the other end.
pub async fn run_session(
    controller: &TimelineController,
    requester: &str,
    script: Script,
) -> (Result<SessionOutcome, TimelineError>, Transcript) {
    let (port, handle) = rendezvous();
    let participant = ScriptedParticipant::new(script);
    tokio::join!(controller.run(requester, port), participant.run(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steer_moves_first_differing_slot() {
        let current = BetVector::uniform();
        assert_eq!(
            steer(&current, BetVector([25, 25, 50, 0])),
            Input::Slider { slot: 2, value: 50 }
        );
        assert_eq!(steer(&current, BetVector::uniform()), Input::Submit);
    }

    #[test]
    fn test_steer_replaces_unsubmittable_target() {
        assert_eq!(
            steer(&BetVector([10, 0, 0, 0]), BetVector([10, 0, 0, 0])),
            Input::Slider { slot: 0, value: 25 }
        );
    }

    #[test]
    fn test_quiz_answers_follow_rounds() {
        let mut p = ScriptedParticipant::new(Script::new().quiz_round([1, 1, 1]));
        let quiz = Screen::Quiz {
            question: 0,
            prompt: QUIZ[0].prompt,
            options: QUIZ[0].options,
        };
        assert_eq!(p.respond(&quiz), Some(Input::Answer { option: 1 }));
        p.respond(&Screen::QuizFeedback {
            correct: 0,
            questions: 3,
            verdict: crate::timeline::QuizVerdict::Retry,
        });
        assert_eq!(
            p.respond(&quiz),
            Some(Input::Answer {
                option: QUIZ[0].expected
            })
        );
    }

    #[test]
    fn test_passive_screens_get_no_answer() {
        let mut p = ScriptedParticipant::new(Script::new());
        assert_eq!(p.respond(&Screen::Loading), None);
        assert_eq!(p.respond(&Screen::Debrief { running_total: 0.0 }), None);
    }
}
