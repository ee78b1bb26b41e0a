//! Ordered trial list and the jumps between its phases

use super::context::SessionContext;
use super::trial::{Trial, TrialEnv, CHIP_STEPS, INSTRUCTION_PAGES, QUIZ};
use crate::content::StudyContent;
use crate::session::{LoopChoice, TrialRecord};

/// The full trial list of one condition with its loop targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    trials: Vec<Trial>,
    /// Index of the first instruction page; both loops jump here
    intro_start: usize,
}

impl Timeline {
    pub fn build(content: &StudyContent) -> Self {
        let mut trials = vec![Trial::Consent, Trial::Fullscreen];
        let intro_start = trials.len();

        trials.push(Trial::Instructions {
            pages: INSTRUCTION_PAGES,
        });
        trials.extend((1..=CHIP_STEPS).map(|step| Trial::ChipInstructions { step }));
        trials.push(Trial::Practice);
        trials.push(Trial::RepeatOrQuiz);
        trials.extend((0..QUIZ.len()).map(|question| Trial::Quiz { question }));
        trials.push(Trial::QuizFeedback);

        for (block, spec) in content.blocks().iter().enumerate() {
            trials.extend((0..spec.hint_count()).map(|hint| Trial::Betting { block, hint }));
            trials.push(Trial::Feedback { block });
        }

        trials.extend([Trial::FreeTextCheck, Trial::Survey, Trial::Debrief]);

        Self {
            trials,
            intro_start,
        }
    }

    pub fn get(&self, index: usize) -> Option<Trial> {
        self.trials.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn intro_start(&self) -> usize {
        self.intro_start
    }

    /// Cursor after `trial` at `index` completed with `record`.
    pub fn next_index(
        &self,
        index: usize,
        trial: Trial,
        record: &TrialRecord,
        ctx: &SessionContext,
        env: &TrialEnv<'_>,
    ) -> usize {
        match (trial, record) {
            (
                Trial::RepeatOrQuiz,
                TrialRecord::LoopChoice {
                    choice: LoopChoice::RepeatInstructions,
                },
            ) => self.intro_start,
            (Trial::QuizFeedback, _) if env.repeats_intro(ctx) => self.intro_start,
            _ => index + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExperimentConfig;
    use crate::content::fixtures;

    #[test]
    fn test_layout() {
        let content = fixtures::content(&[2, 3]);
        let timeline = Timeline::build(&content);

        assert_eq!(timeline.get(0), Some(Trial::Consent));
        assert_eq!(
            timeline.get(timeline.intro_start()),
            Some(Trial::Instructions {
                pages: INSTRUCTION_PAGES
            })
        );

        let betting: Vec<_> = (0..timeline.len())
            .filter_map(|i| timeline.get(i))
            .filter(|t| matches!(t, Trial::Betting { .. } | Trial::Feedback { .. }))
            .collect();
        assert_eq!(
            betting,
            vec![
                Trial::Betting { block: 0, hint: 0 },
                Trial::Betting { block: 0, hint: 1 },
                Trial::Feedback { block: 0 },
                Trial::Betting { block: 1, hint: 0 },
                Trial::Betting { block: 1, hint: 1 },
                Trial::Betting { block: 1, hint: 2 },
                Trial::Feedback { block: 1 },
            ]
        );
        assert_eq!(timeline.get(timeline.len() - 1), Some(Trial::Debrief));
    }

    #[test]
    fn test_repeat_choice_jumps_to_instructions() {
        let content = fixtures::content(&[1]);
        let env = TrialEnv::new(&content, &ExperimentConfig::default());
        let timeline = Timeline::build(&content);
        let ctx = SessionContext::new();

        let repeat = TrialRecord::LoopChoice {
            choice: LoopChoice::RepeatInstructions,
        };
        let quiz = TrialRecord::LoopChoice {
            choice: LoopChoice::TakeQuiz,
        };
        assert_eq!(
            timeline.next_index(9, Trial::RepeatOrQuiz, &repeat, &ctx, &env),
            timeline.intro_start()
        );
        assert_eq!(timeline.next_index(9, Trial::RepeatOrQuiz, &quiz, &ctx, &env), 10);
    }

    #[test]
    fn test_quiz_feedback_loop_is_capped() {
        let content = fixtures::content(&[1]);
        let env = TrialEnv::new(&content, &ExperimentConfig::default());
        let timeline = Timeline::build(&content);
        let record = TrialRecord::QuizFeedback {
            correct: 0,
            quiz_loops: 1,
        };

        let failing = SessionContext {
            quiz_correct: 0,
            quiz_loops: 1,
            ..SessionContext::new()
        };
        assert_eq!(
            timeline.next_index(14, Trial::QuizFeedback, &record, &failing, &env),
            timeline.intro_start()
        );

        let exhausted = SessionContext {
            quiz_loops: 2,
            ..failing.clone()
        };
        assert_eq!(
            timeline.next_index(14, Trial::QuizFeedback, &record, &exhausted, &env),
            15
        );

        let passed = SessionContext {
            quiz_correct: 2,
            ..failing
        };
        assert_eq!(timeline.next_index(14, Trial::QuizFeedback, &record, &passed, &env), 15);
    }
}
