//! Rule store
//!
//! Holds each regulator's rules in load order. A load replaces a
//! regulator's whole list in one swap, so an evaluation that already took
//! its snapshot keeps seeing a consistent set.

use crate::error::ComplianceError;
use crate::rules::{normalize_regulator, Rule};
use crate::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one bulk load
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    /// Regulators whose rule lists were replaced, sorted
    pub regulators: Vec<String>,
    /// Per-record failures; the rest of the batch still loads
    pub rejected: Vec<ComplianceError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    DuplicateRuleId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub regulator: String,
    pub rule_ids: Vec<String>,
    pub message: String,
}

pub struct RuleStore {
    rules: RwLock<BTreeMap<String, Arc<Vec<Rule>>>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
        }
    }

    /// Load a batch of raw rule records.
    ///
    /// Every regulator with at least one valid record has its rule list
    /// replaced by exactly the valid records of this batch, in batch order.
    pub fn load(&self, definitions: Vec<Value>) -> LoadReport {
        let mut report = LoadReport::default();
        let mut grouped: BTreeMap<String, Vec<Rule>> = BTreeMap::new();

        for (index, value) in definitions.into_iter().enumerate() {
            match Rule::from_value(index, value) {
                Ok(rule) => {
                    grouped
                        .entry(rule.regulator().to_string())
                        .or_default()
                        .push(rule);
                }
                Err(e) => {
                    warn!(index, error = %e, "Rejected rule definition");
                    report.rejected.push(e);
                }
            }
        }

        report.loaded = grouped.values().map(Vec::len).sum();
        report.regulators = grouped.keys().cloned().collect();

        {
            let mut rules = self.rules.write();
            for (regulator, list) in grouped {
                rules.insert(regulator, Arc::new(list));
            }
        }

        info!(
            loaded = report.loaded,
            rejected = report.rejected.len(),
            regulators = ?report.regulators,
            "Rules loaded"
        );

        report
    }

    /// Load from a JSON document whose top level is a list of records
    pub fn load_json(&self, json: &str) -> Result<LoadReport> {
        let definitions: Vec<Value> = serde_json::from_str(json)?;
        Ok(self.load(definitions))
    }

    pub fn load_from_path(&self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rules file");
        let contents = std::fs::read_to_string(path)?;
        self.load_json(&contents)
    }

    /// Snapshot of one regulator's rules in load order
    pub fn rules_for(&self, regulator: &str) -> Option<Arc<Vec<Rule>>> {
        self.rules
            .read()
            .get(&normalize_regulator(regulator))
            .cloned()
    }

    pub fn regulators(&self) -> Vec<String> {
        self.rules.read().keys().cloned().collect()
    }

    /// Total number of rules across regulators
    pub fn len(&self) -> usize {
        self.rules.read().values().map(|list| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }

    /// One issue per regulator whose list repeats a rule id
    pub fn validate_consistency(&self) -> Vec<ConsistencyIssue> {
        let rules = self.rules.read();
        let mut issues = Vec::new();

        for (regulator, list) in rules.iter() {
            let mut seen = HashSet::new();
            let duplicates: BTreeSet<String> = list
                .iter()
                .filter(|rule| !seen.insert(rule.rule_id()))
                .map(|rule| rule.rule_id().to_string())
                .collect();

            if !duplicates.is_empty() {
                issues.push(ConsistencyIssue {
                    issue_type: IssueType::DuplicateRuleId,
                    regulator: regulator.clone(),
                    rule_ids: duplicates.into_iter().collect(),
                    message: "Duplicate rule IDs found".to_string(),
                });
            }
        }

        issues
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(regulator: &str, rule_id: &str) -> Value {
        json!({
            "rule_id": rule_id,
            "regulator": regulator,
            "rule_type": "validation",
            "description": "revenue must be positive",
            "expression": "revenue > 0",
            "parameters": {"field": "revenue", "condition": "positive"},
            "version": "1.0",
            "effective_date": "2024-01-01"
        })
    }

    #[test]
    fn test_load_preserves_order_and_groups() {
        let store = RuleStore::new();
        let report = store.load(vec![
            definition("SEC", "B"),
            definition("FCA", "X"),
            definition("sec", "A"),
        ]);

        assert!(report.is_clean());
        assert_eq!(report.loaded, 3);
        assert_eq!(report.regulators, vec!["FCA", "SEC"]);

        let sec = store.rules_for("Sec").unwrap();
        let ids: Vec<&str> = sec.iter().map(|r| r.rule_id()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn test_load_replaces_per_regulator() {
        let store = RuleStore::new();
        store.load(vec![definition("SEC", "OLD1"), definition("SEC", "OLD2"), definition("FCA", "F1")]);
        store.load(vec![definition("SEC", "NEW")]);

        let sec = store.rules_for("SEC").unwrap();
        assert_eq!(sec.len(), 1);
        assert_eq!(sec[0].rule_id(), "NEW");
        assert_eq!(store.rules_for("FCA").unwrap().len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_bad_record_does_not_abort_batch() {
        let store = RuleStore::new();
        let mut bad = definition("SEC", "BAD");
        bad["rule_type"] = json!("scoring");

        let report = store.load(vec![definition("SEC", "A"), bad, definition("SEC", "C")]);

        assert_eq!(report.loaded, 2);
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(
            report.rejected[0],
            ComplianceError::InvalidRuleType { index: 1, .. }
        ));
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let store = RuleStore::new();
        store.load(vec![definition("SEC", "A")]);

        let snapshot = store.rules_for("SEC").unwrap();
        store.load(vec![definition("SEC", "B"), definition("SEC", "C")]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].rule_id(), "A");
        assert_eq!(store.rules_for("SEC").unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_rule_ids_reported_once_per_regulator() {
        let store = RuleStore::new();
        store.load(vec![
            definition("SEC", "DUP"),
            definition("SEC", "DUP"),
            definition("SEC", "DUP"),
            definition("FCA", "DUP"),
        ]);

        let issues = store.validate_consistency();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::DuplicateRuleId);
        assert_eq!(issues[0].regulator, "SEC");
        assert_eq!(issues[0].rule_ids, vec!["DUP"]);

        let value = serde_json::to_value(&issues[0]).unwrap();
        assert_eq!(value["type"], "duplicate_rule_id");
    }

    #[test]
    fn test_load_json_requires_list() {
        let store = RuleStore::new();
        assert!(store.load_json("{\"rule_id\": \"A\"}").is_err());
        assert!(store.load_json("[]").unwrap().is_clean());
        assert!(store.is_empty());
    }
}
