//! Rule definitions and their compiled form
//!
//! A rules file is a list of loosely-typed records. Each record is checked
//! and compiled into a [`Rule`] whose [`RuleAction`] carries only what its
//! evaluator needs.

pub mod registry;
pub mod store;

pub use registry::{
    create_default_calculations, create_default_transformations, Amount, Calculation,
    CalculationRegistry, Transformation, TransformationRegistry,
};
pub use store::{ConsistencyIssue, IssueType, LoadReport, RuleStore};

use crate::error::ComplianceError;
use crate::models::{Parameters, RuleKey, RuleType};
use crate::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record of the external rules definition source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub rule_id: String,
    pub regulator: String,
    pub rule_type: String,
    pub description: String,
    pub expression: String,
    #[serde(default)]
    pub parameters: Option<Parameters>,
    pub version: String,
    pub effective_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationCondition {
    Required,
    Positive,
    Other(String),
}

impl ValidationCondition {
    fn parse(value: &str) -> Self {
        match value {
            "required" => ValidationCondition::Required,
            "positive" => ValidationCondition::Positive,
            other => ValidationCondition::Other(other.to_string()),
        }
    }
}

/// What a rule does when evaluated
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuleAction {
    /// Checked only when both a field and a condition are configured
    Validation {
        field: Option<String>,
        condition: Option<ValidationCondition>,
    },
    Calculation {
        function: String,
    },
    Transformation {
        transform: String,
    },
    Conditional,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    pub key: RuleKey,
    pub rule_type: RuleType,
    pub description: String,
    pub expression: String,
    pub parameters: Parameters,
    pub version: String,
    pub effective_date: DateTime<Utc>,
    pub action: RuleAction,
}

impl Rule {
    /// Check one raw record. `index` is its position in the batch.
    pub fn from_value(index: usize, value: Value) -> Result<Self> {
        let definition: RuleDefinition =
            serde_json::from_value(value).map_err(|e| ComplianceError::MalformedRule {
                index,
                reason: e.to_string(),
            })?;

        Self::compile(index, definition)
    }

    pub fn compile(index: usize, definition: RuleDefinition) -> Result<Self> {
        let rule_id = definition.rule_id.trim();
        let regulator = normalize_regulator(&definition.regulator);

        if rule_id.is_empty() {
            return Err(malformed(index, "rule_id is empty"));
        }
        if regulator.is_empty() {
            return Err(malformed(index, "regulator is empty"));
        }

        let rule_type = RuleType::parse(definition.rule_type.trim()).ok_or_else(|| {
            ComplianceError::InvalidRuleType {
                index,
                value: definition.rule_type.clone(),
            }
        })?;

        let effective_date = parse_timestamp(&definition.effective_date).ok_or_else(|| {
            malformed(
                index,
                &format!("unparseable effective_date '{}'", definition.effective_date),
            )
        })?;

        let parameters = definition.parameters.unwrap_or_default();
        let action = compile_action(index, rule_type, &definition.expression, &parameters)?;

        Ok(Self {
            key: RuleKey::new(regulator, rule_id),
            rule_type,
            description: definition.description,
            expression: definition.expression,
            parameters,
            version: definition.version,
            effective_date,
            action,
        })
    }

    pub fn rule_id(&self) -> &str {
        &self.key.rule_id
    }

    pub fn regulator(&self) -> &str {
        &self.key.regulator
    }

    pub fn is_effective(&self, as_of: DateTime<Utc>) -> bool {
        self.effective_date <= as_of
    }
}

fn compile_action(
    index: usize,
    rule_type: RuleType,
    expression: &str,
    parameters: &Parameters,
) -> Result<RuleAction> {
    let action = match rule_type {
        RuleType::Validation => RuleAction::Validation {
            field: string_parameter(index, parameters, "field")?,
            condition: string_parameter(index, parameters, "condition")?
                .map(|c| ValidationCondition::parse(&c)),
        },
        RuleType::Calculation => RuleAction::Calculation {
            function: expression.trim().to_string(),
        },
        RuleType::Transformation => RuleAction::Transformation {
            transform: expression.trim().to_string(),
        },
        RuleType::Conditional => RuleAction::Conditional,
    };

    Ok(action)
}

fn string_parameter(index: usize, parameters: &Parameters, name: &str) -> Result<Option<String>> {
    match parameters.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(malformed(
            index,
            &format!("parameter '{}' must be a string, got {}", name, other),
        )),
    }
}

fn malformed(index: usize, reason: &str) -> ComplianceError {
    ComplianceError::MalformedRule {
        index,
        reason: reason.to_string(),
    }
}

/// Regulator codes are compared trimmed and upper-cased
pub fn normalize_regulator(regulator: &str) -> String {
    regulator.trim().to_uppercase()
}

/// Parse an ISO-8601 timestamp. Offset-less values are taken as UTC and a
/// bare date means midnight.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(rule_type: &str, expression: &str, parameters: Value) -> Value {
        json!({
            "rule_id": "R1",
            "regulator": " sec ",
            "rule_type": rule_type,
            "description": "test rule",
            "expression": expression,
            "parameters": parameters,
            "version": "1.0",
            "effective_date": "2024-01-01T00:00:00"
        })
    }

    #[test]
    fn test_compile_validation() {
        let rule = Rule::from_value(
            0,
            record("validation", "revenue > 0", json!({"field": "revenue", "condition": "positive"})),
        )
        .unwrap();

        assert_eq!(rule.key, RuleKey::new("SEC", "R1"));
        assert_eq!(
            rule.action,
            RuleAction::Validation {
                field: Some("revenue".to_string()),
                condition: Some(ValidationCondition::Positive),
            }
        );
    }

    #[test]
    fn test_parameters_optional() {
        let mut value = record("conditional", "if_large_filer", json!(null));
        value.as_object_mut().unwrap().remove("parameters");

        let rule = Rule::from_value(3, value).unwrap();
        assert!(rule.parameters.is_empty());
        assert_eq!(rule.action, RuleAction::Conditional);
    }

    #[test]
    fn test_invalid_rule_type() {
        let err = Rule::from_value(2, record("aggregation", "sum", json!({}))).unwrap_err();
        assert!(matches!(
            err,
            ComplianceError::InvalidRuleType { index: 2, ref value } if value == "aggregation"
        ));
    }

    #[test]
    fn test_malformed_records() {
        let mut missing = record("calculation", "working_capital", json!({}));
        missing.as_object_mut().unwrap().remove("version");
        assert!(matches!(
            Rule::from_value(0, missing),
            Err(ComplianceError::MalformedRule { index: 0, .. })
        ));

        let mut bad_date = record("calculation", "working_capital", json!({}));
        bad_date["effective_date"] = json!("next tuesday");
        assert!(matches!(
            Rule::from_value(1, bad_date),
            Err(ComplianceError::MalformedRule { index: 1, .. })
        ));

        let bad_field = record("validation", "", json!({"field": 7, "condition": "required"}));
        assert!(matches!(
            Rule::from_value(2, bad_field),
            Err(ComplianceError::MalformedRule { index: 2, .. })
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = "2024-03-01T00:00:00+00:00";
        for input in [
            "2024-03-01",
            "2024-03-01T00:00:00",
            "2024-03-01 00:00:00",
            "2024-03-01T00:00:00Z",
            "2024-03-01T01:00:00+01:00",
        ] {
            assert_eq!(parse_timestamp(input).unwrap().to_rfc3339(), expected, "{}", input);
        }

        assert!(parse_timestamp("01/03/2024").is_none());
    }

    #[test]
    fn test_is_effective() {
        let rule = Rule::from_value(0, record("conditional", "noop", json!({}))).unwrap();
        assert!(rule.is_effective(parse_timestamp("2024-01-01").unwrap()));
        assert!(!rule.is_effective(parse_timestamp("2023-12-31").unwrap()));
    }
}
