//! Session payload assembled when a participant reaches the end of the timeline

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bets::BetVector;
use crate::client::ClientError;
use crate::content::Ident;

/// Answers collected by the post-study survey
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub language: Option<String>,
    pub enjoyment: Option<String>,
    pub assess: Option<String>,
    pub age: Option<String>,
    pub gender_cat: Option<String>,
    pub gender_text: Option<String>,
    pub education: Option<String>,
    pub comments: Option<String>,
}

/// Choice offered at the end of the instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopChoice {
    RepeatInstructions,
    TakeQuiz,
}

/// What a completed trial contributes to the session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrialRecord {
    Consent {
        agreed: bool,
    },
    Fullscreen,
    Instructions {
        pages: usize,
    },
    ChipInstructions {
        step: u8,
    },
    Practice {
        bets: BetVector,
    },
    LoopChoice {
        choice: LoopChoice,
    },
    QuizAnswer {
        question: usize,
        answer: usize,
        correct: bool,
    },
    QuizFeedback {
        correct: u32,
        quiz_loops: u32,
    },
    Bet {
        block: usize,
        hint: usize,
        teacher: Option<Ident>,
        problem: Ident,
        bets: BetVector,
        bonus: f64,
    },
    Feedback {
        block: usize,
        bets: BetVector,
        block_bonus: f64,
        running_total: f64,
    },
    FreeText {
        text: String,
    },
    Survey {
        response: SurveyResponse,
    },
    Debrief,
}

/// A completed trial with its position in the run and timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialEntry {
    pub trial_index: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: TrialRecord,
}

/// Everything persisted about one finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub session_id: Uuid,
    /// Requester token the lease was taken under
    pub requester: String,
    pub condition_id: i64,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub trials: Vec<TrialEntry>,
    pub instruction_loops: u32,
    pub quiz_loops: u32,
    pub quiz_correct: u32,
    pub running_total: f64,
    pub free_text: Option<String>,
    pub survey: Option<SurveyResponse>,
}

impl SessionPayload {
    /// Betting trial records in presentation order
    pub fn bets(&self) -> impl Iterator<Item = &TrialRecord> {
        self.trials
            .iter()
            .map(|entry| &entry.record)
            .filter(|record| matches!(record, TrialRecord::Bet { .. }))
    }

    /// Block bonuses as shown on each feedback screen
    pub fn block_bonuses(&self) -> Vec<f64> {
        self.trials
            .iter()
            .filter_map(|entry| match entry.record {
                TrialRecord::Feedback { block_bonus, .. } => Some(block_bonus),
                _ => None,
            })
            .collect()
    }
}

/// Destination for finished session payloads
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn submit(&self, payload: &SessionPayload) -> Result<(), ClientError>;
}

/// Keeps payloads in memory (for tests and dry runs)
#[derive(Default)]
pub struct MemorySink {
    payloads: Mutex<Vec<SessionPayload>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<SessionPayload> {
        self.payloads
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionSink for MemorySink {
    async fn submit(&self, payload: &SessionPayload) -> Result<(), ClientError> {
        self.payloads
            .lock()
            .map_err(|e| ClientError::Internal(format!("Lock poisoned: {}", e)))?
            .push(payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_record_is_tagged() {
        let entry = TrialEntry {
            trial_index: 3,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            record: TrialRecord::QuizAnswer {
                question: 1,
                answer: 4,
                correct: true,
            },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "quiz_answer");
        assert_eq!(value["trial_index"], 3);
        assert_eq!(value["correct"], true);

        let back: TrialEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back.record, entry.record);
    }

    #[tokio::test]
    async fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        let payload = SessionPayload {
            session_id: Uuid::new_v4(),
            requester: "w".into(),
            condition_id: 1,
            version: "test".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            trials: vec![],
            instruction_loops: 0,
            quiz_loops: 1,
            quiz_correct: 3,
            running_total: 0.0,
            free_text: None,
            survey: None,
        };
        sink.submit(&payload).await.unwrap();
        assert_eq!(sink.payloads().len(), 1);
    }
}
