//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use cohort::config::ExperimentConfig;
use cohort::content::ProblemBank;
use cohort::store::ProvisionRecord;
use cohort::LeaseStore;
use serde_json::{json, Value};

/// Trial payload with the given hint counts per block. Block `b` uses
/// problem `p{b}` and puts the correct hypothesis in slot `b % 4`.
pub fn trial_order(hints: &[usize]) -> Value {
    let blocks: Vec<Value> = hints
        .iter()
        .enumerate()
        .map(|(b, &n)| {
            let mut order = vec!["B", "C", "D"];
            order.insert(b % 4, "A");
            let states: Vec<Value> = (0..n)
                .map(|h| json!([[1, if h >= 1 { 1 } else { 0 }, if h >= 2 { 1 } else { 0 }]]))
                .collect();
            json!({
                "teacher": b + 100,
                "problem": format!("p{}", b),
                "states": states,
                "order": order,
            })
        })
        .collect();
    Value::Array(blocks)
}

pub fn problem_bank_json(blocks: usize) -> Value {
    let mut bank = serde_json::Map::new();
    for b in 0..blocks {
        bank.insert(
            format!("p{}", b),
            json!({
                "A": [[1, 0, 1]],
                "B": [[0, 1, 1]],
                "C": [[1, 1, 0]],
                "D": [[0, 0, 0]],
            }),
        );
    }
    Value::Object(bank)
}

pub fn problem_bank(blocks: usize) -> ProblemBank {
    ProblemBank::parse(&problem_bank_json(blocks).to_string()).unwrap()
}

/// In-memory store with conditions `ids`, all sharing one trial payload.
pub fn store_with(ids: &[i64], hints: &[usize]) -> Arc<LeaseStore> {
    let store = LeaseStore::open_in_memory().unwrap();
    let payload = trial_order(hints).to_string();
    let records: Vec<_> = ids
        .iter()
        .map(|&id| ProvisionRecord {
            condition_id: id,
            trial_order: Value::String(payload.clone()),
        })
        .collect();
    store.provision(&records).unwrap();
    Arc::new(store)
}

pub fn experiment(budget: f64, dwell_ms: u64) -> ExperimentConfig {
    ExperimentConfig {
        bonus_budget: budget,
        feedback_dwell_ms: dwell_ms,
        version: "test".to_string(),
        ..ExperimentConfig::default()
    }
}
