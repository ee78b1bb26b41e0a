//! Trial payload and problem bank
//!
//! Both are external, read-only inputs: the trial payload comes with the
//! leased condition, the problem bank is fetched separately at startup.
//! `StudyContent` only exists once both have been checked against each
//! other, so the timeline never starts on partial data.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label of the hypothesis that is always the correct answer
pub const CANONICAL_LABEL: &str = "A";

/// Number of hypotheses offered on every betting trial
pub const HYPOTHESIS_COUNT: usize = 4;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ContentError {
    #[error("Trial payload has no blocks")]
    NoBlocks,

    #[error("Block {block} has no hints")]
    EmptyBlock { block: usize },

    #[error("Block {block} hypothesis order is invalid: {reason}")]
    InvalidOrder { block: usize, reason: String },

    #[error("Block {block} references unknown problem {problem}")]
    UnknownProblem { block: usize, problem: Ident },

    #[error("Problem {problem} has no evidence for hypothesis {label}")]
    MissingHypothesis { problem: Ident, label: String },

    #[error("Malformed content: {0}")]
    Malformed(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),
}

/// Identifier that may arrive as a JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ident {
    Number(i64),
    Text(String),
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Number(n) => write!(f, "{}", n),
            Ident::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CellRepr {
    Flag(bool),
    Count(i64),
}

/// Grid of revealed tiles for one hint; `true` means revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HintMatrix(pub Vec<Vec<bool>>);

impl<'de> Deserialize<'de> for HintMatrix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let rows: Vec<Vec<CellRepr>> = Vec::deserialize(deserializer)?;
        Ok(HintMatrix(
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| match cell {
                            CellRepr::Flag(b) => b,
                            CellRepr::Count(n) => n != 0,
                        })
                        .collect()
                })
                .collect(),
        ))
    }
}

impl HintMatrix {
    /// Number of revealed tiles
    pub fn revealed(&self) -> usize {
        self.0.iter().flatten().filter(|&&cell| cell).count()
    }
}

/// Per-hypothesis evidence grid of a problem
pub type EvidenceMatrix = Vec<Vec<i64>>;

/// One block of the trial payload: a problem and its hint progression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    /// Who picked the hints for this block
    #[serde(default)]
    pub teacher: Option<Ident>,
    pub problem: Ident,
    /// Hint reveals, in presentation order
    pub states: Vec<HintMatrix>,
    /// Hypothesis labels in on-screen slot order
    pub order: Vec<String>,
}

impl BlockSpec {
    pub fn hint_count(&self) -> usize {
        self.states.len()
    }

    /// Slot index holding the canonical correct hypothesis.
    pub fn correct_index(&self) -> Option<usize> {
        self.order.iter().position(|label| label == CANONICAL_LABEL)
    }

    fn validate(&self, block: usize) -> Result<usize, ContentError> {
        if self.states.is_empty() {
            return Err(ContentError::EmptyBlock { block });
        }
        if self.order.len() != HYPOTHESIS_COUNT {
            return Err(ContentError::InvalidOrder {
                block,
                reason: format!("expected {} labels, got {}", HYPOTHESIS_COUNT, self.order.len()),
            });
        }
        for (i, label) in self.order.iter().enumerate() {
            if self.order[..i].contains(label) {
                return Err(ContentError::InvalidOrder {
                    block,
                    reason: format!("duplicate label {}", label),
                });
            }
        }
        self.correct_index().ok_or_else(|| ContentError::InvalidOrder {
            block,
            reason: format!("missing canonical label {}", CANONICAL_LABEL),
        })
    }
}

/// Ordered blocks of one condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialOrder(pub Vec<BlockSpec>);

impl TrialOrder {
    /// Parse the serialized payload stored with a condition record.
    pub fn parse(raw: &str) -> Result<Self, ContentError> {
        serde_json::from_str(raw).map_err(|e| ContentError::Malformed(format!("trial order: {}", e)))
    }

    pub fn blocks(&self) -> &[BlockSpec] {
        &self.0
    }
}

/// Problem id → hypothesis label → evidence grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemBank(pub HashMap<String, HashMap<String, EvidenceMatrix>>);

impl ProblemBank {
    pub fn parse(raw: &str) -> Result<Self, ContentError> {
        serde_json::from_str(raw).map_err(|e| ContentError::Malformed(format!("problem bank: {}", e)))
    }

    pub fn problem(&self, id: &Ident) -> Option<&HashMap<String, EvidenceMatrix>> {
        self.0.get(&id.to_string())
    }
}

/// A trial payload checked against the problem bank
#[derive(Debug, Clone)]
pub struct StudyContent {
    order: TrialOrder,
    bank: ProblemBank,
    correct: Vec<usize>,
}

impl StudyContent {
    pub fn new(order: TrialOrder, bank: ProblemBank) -> Result<Self, ContentError> {
        if order.0.is_empty() {
            return Err(ContentError::NoBlocks);
        }

        let mut correct = Vec::with_capacity(order.0.len());
        for (block, spec) in order.0.iter().enumerate() {
            correct.push(spec.validate(block)?);

            let problem = bank.problem(&spec.problem).ok_or_else(|| ContentError::UnknownProblem {
                block,
                problem: spec.problem.clone(),
            })?;
            for label in &spec.order {
                if !problem.contains_key(label) {
                    return Err(ContentError::MissingHypothesis {
                        problem: spec.problem.clone(),
                        label: label.clone(),
                    });
                }
            }
        }

        Ok(Self { order, bank, correct })
    }

    pub fn block_count(&self) -> usize {
        self.order.0.len()
    }

    pub fn block(&self, index: usize) -> Option<&BlockSpec> {
        self.order.0.get(index)
    }

    pub fn blocks(&self) -> &[BlockSpec] {
        self.order.blocks()
    }

    /// Correct slot of a validated block
    pub fn correct_index(&self, block: usize) -> Option<usize> {
        self.correct.get(block).copied()
    }

    /// Evidence grids for a block, in the block's slot order
    pub fn hypotheses(&self, block: usize) -> Vec<EvidenceMatrix> {
        let Some(spec) = self.block(block) else {
            return Vec::new();
        };
        let Some(problem) = self.bank.problem(&spec.problem) else {
            return Vec::new();
        };
        spec.order
            .iter()
            .filter_map(|label| problem.get(label).cloned())
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Payload with the given hint counts per block; block `b` uses problem
    /// `p{b}` and puts the correct hypothesis in slot `b % 4`.
    pub fn trial_order(hints: &[usize]) -> TrialOrder {
        TrialOrder(
            hints
                .iter()
                .enumerate()
                .map(|(b, &n)| {
                    let mut order = vec!["B".to_string(), "C".to_string(), "D".to_string()];
                    order.insert(b % HYPOTHESIS_COUNT, CANONICAL_LABEL.to_string());
                    BlockSpec {
                        teacher: Some(Ident::Number(b as i64 + 100)),
                        problem: Ident::Text(format!("p{}", b)),
                        states: (0..n)
                            .map(|h| HintMatrix(vec![vec![true, h >= 1, h >= 2]]))
                            .collect(),
                        order,
                    }
                })
                .collect(),
        )
    }

    pub fn problem_bank(blocks: usize) -> ProblemBank {
        let mut bank = HashMap::new();
        for b in 0..blocks {
            let problem = ["A", "B", "C", "D"]
                .iter()
                .enumerate()
                .map(|(i, label)| (label.to_string(), vec![vec![i as i64, 0, 1]]))
                .collect();
            bank.insert(format!("p{}", b), problem);
        }
        ProblemBank(bank)
    }

    pub fn content(hints: &[usize]) -> StudyContent {
        StudyContent::new(trial_order(hints), problem_bank(hints.len())).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_payload_with_numeric_ids_and_int_cells() {
        let raw = r#"[
            {"teacher": 12, "problem": 3, "states": [[[0, 1], [0, 0]], [[1, 1], [0, 0]]], "order": ["C", "A", "D", "B"]}
        ]"#;
        let order = TrialOrder::parse(raw).unwrap();
        let block = &order.blocks()[0];
        assert_eq!(block.problem, Ident::Number(3));
        assert_eq!(block.hint_count(), 2);
        assert_eq!(block.states[1].revealed(), 2);
        assert_eq!(block.correct_index(), Some(1));
    }

    #[test]
    fn test_problem_lookup_by_numeric_id() {
        let bank = ProblemBank::parse(r#"{"3": {"A": [[1]], "B": [[0]], "C": [[0]], "D": [[0]]}}"#).unwrap();
        assert!(bank.problem(&Ident::Number(3)).is_some());
        assert!(bank.problem(&Ident::Text("4".into())).is_none());
    }

    #[test]
    fn test_study_content_validates() {
        let content = content(&[2, 3]);
        assert_eq!(content.block_count(), 2);
        assert_eq!(content.correct_index(0), Some(0));
        assert_eq!(content.correct_index(1), Some(1));
        assert_eq!(content.hypotheses(1).len(), HYPOTHESIS_COUNT);
    }

    #[test]
    fn test_rejects_unknown_problem() {
        let err = StudyContent::new(trial_order(&[1, 1]), problem_bank(1)).unwrap_err();
        assert!(matches!(err, ContentError::UnknownProblem { block: 1, .. }));
    }

    #[test]
    fn test_rejects_empty_block() {
        let err = StudyContent::new(trial_order(&[2, 0]), problem_bank(2)).unwrap_err();
        assert!(matches!(err, ContentError::EmptyBlock { block: 1 }));
    }

    #[test]
    fn test_rejects_order_without_canonical_label() {
        let mut order = trial_order(&[1]);
        order.0[0].order = vec!["B".into(), "C".into(), "D".into(), "E".into()];
        let err = StudyContent::new(order, problem_bank(1)).unwrap_err();
        assert!(matches!(err, ContentError::InvalidOrder { block: 0, .. }));
    }

    #[test]
    fn test_rejects_empty_payload() {
        let err = StudyContent::new(TrialOrder(vec![]), problem_bank(0)).unwrap_err();
        assert!(matches!(err, ContentError::NoBlocks));
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            TrialOrder::parse("{not json"),
            Err(ContentError::Malformed(_))
        ));
    }
}
