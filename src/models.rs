//! Core data models for interpretation and rule evaluation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Flat key-value financial data record
pub type DataRecord = serde_json::Map<String, Value>;

/// Named configuration values carried by a rule
pub type Parameters = serde_json::Map<String, Value>;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn rank(&self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        }
    }
}

impl PartialOrd for RiskLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RiskLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Kind of reading produced for a regulatory passage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterpretationType {
    Requirement,
    Prohibition,
    Exemption,
    Calculation,
    Definition,
    Process,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Validation,
    Calculation,
    Transformation,
    Conditional,
}

impl RuleType {
    /// Parse the wire representation used by rule definition files
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "validation" => Some(RuleType::Validation),
            "calculation" => Some(RuleType::Calculation),
            "transformation" => Some(RuleType::Transformation),
            "conditional" => Some(RuleType::Conditional),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Validation => "validation",
            RuleType::Calculation => "calculation",
            RuleType::Transformation => "transformation",
            RuleType::Conditional => "conditional",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Passed,
    Failed,
    Success,
    Error,
}

//
// ================= Interpretation =================
//

/// Structured reading of a regulatory passage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpretation {
    pub regulation_id: String,
    pub section: String,
    pub interpretation_type: InterpretationType,
    pub original_text: String,
    pub interpreted_meaning: String,
    pub data_requirements: BTreeSet<String>,
    pub calculation_formula: Option<BTreeMap<String, String>>,
    pub conditions: Vec<String>,
    pub effective_date: DateTime<Utc>,
    pub confidence_score: f64,
    pub metadata: Value,
}

//
// ================= Rule Results =================
//

/// Compound identity of a rule: ids are only unique within a regulator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    pub regulator: String,
    pub rule_id: String,
}

impl RuleKey {
    pub fn new(regulator: impl Into<String>, rule_id: impl Into<String>) -> Self {
        Self {
            regulator: regulator.into(),
            rule_id: rule_id.into(),
        }
    }
}

/// Outcome of applying one rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleApplicationResult {
    #[serde(flatten)]
    pub key: RuleKey,
    pub status: RuleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl RuleApplicationResult {
    pub fn rule_id(&self) -> &str {
        &self.key.rule_id
    }
}

/// Everything one evaluation pass produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationBundle {
    pub evaluation_id: Uuid,
    pub regulator: String,
    pub evaluated_at: DateTime<Utc>,
    pub data: DataRecord,
    pub validation_results: Vec<RuleApplicationResult>,
    pub calculations: BTreeMap<String, Value>,
    pub transformations: BTreeMap<String, Parameters>,
    pub rule_applications: Vec<RuleApplicationResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub passed: usize,
    pub failed: usize,
    pub succeeded: usize,
    pub errored: usize,
}

impl EvaluationBundle {
    /// Counts per outcome status, for dashboard consumers
    pub fn summary(&self) -> EvaluationSummary {
        let mut summary = EvaluationSummary {
            evaluated: self.rule_applications.len(),
            ..Default::default()
        };

        for application in &self.rule_applications {
            match application.status {
                RuleStatus::Passed => summary.passed += 1,
                RuleStatus::Failed => summary.failed += 1,
                RuleStatus::Success => summary.succeeded += 1,
                RuleStatus::Error => summary.errored += 1,
            }
        }

        summary
    }

    /// True when no rule failed or errored
    pub fn is_compliant(&self) -> bool {
        let summary = self.summary();
        summary.failed == 0 && summary.errored == 0
    }

    pub fn application(&self, rule_id: &str) -> Option<&RuleApplicationResult> {
        self.rule_applications
            .iter()
            .find(|application| application.rule_id() == rule_id)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for InterpretationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterpretationType::Requirement => "REQUIREMENT",
            InterpretationType::Prohibition => "PROHIBITION",
            InterpretationType::Exemption => "EXEMPTION",
            InterpretationType::Calculation => "CALCULATION",
            InterpretationType::Definition => "DEFINITION",
            InterpretationType::Process => "PROCESS",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.regulator, self.rule_id)
    }
}
