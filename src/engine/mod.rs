//! Rule engine
//!
//! Applies a regulator's effective rules to a financial data record.
//! Rules run in load order over a working snapshot; a transformation's
//! output is what every later rule sees. A rule that faults is recorded
//! as an `error` outcome and evaluation continues with the next rule.

use crate::config::{EngineConfig, UnknownNamePolicy};
use crate::error::ComplianceError;
use crate::models::{
    DataRecord, EvaluationBundle, RuleApplicationResult, RuleStatus, RuleType,
};
use crate::rules::registry::numeric_field;
use crate::rules::{
    create_default_calculations, create_default_transformations, normalize_regulator, Rule,
    RuleAction, RuleStore, ValidationCondition, CalculationRegistry, TransformationRegistry,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What one evaluator produced for one rule
enum RuleOutcome {
    Validation {
        status: RuleStatus,
        message: Option<String>,
    },
    Calculation {
        value: Value,
    },
    Transformation {
        data: DataRecord,
    },
    Conditional,
}

pub struct RuleEngine {
    store: Arc<RuleStore>,
    calculations: CalculationRegistry,
    transformations: TransformationRegistry,
    unknown_condition_policy: UnknownNamePolicy,
    unknown_transformation_policy: UnknownNamePolicy,
}

impl RuleEngine {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self::with_config(store, &EngineConfig::default())
    }

    pub fn with_config(store: Arc<RuleStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            calculations: create_default_calculations(),
            transformations: create_default_transformations(),
            unknown_condition_policy: config.unknown_condition_policy,
            unknown_transformation_policy: config.unknown_transformation_policy,
        }
    }

    pub fn with_registries(
        mut self,
        calculations: CalculationRegistry,
        transformations: TransformationRegistry,
    ) -> Self {
        self.calculations = calculations;
        self.transformations = transformations;
        self
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn calculations(&self) -> &CalculationRegistry {
        &self.calculations
    }

    pub fn transformations(&self) -> &TransformationRegistry {
        &self.transformations
    }

    /// Evaluate every rule of `regulator` effective now
    pub fn evaluate(&self, data: &DataRecord, regulator: &str) -> Result<EvaluationBundle> {
        self.evaluate_at(data, regulator, Utc::now())
    }

    /// Evaluate every rule of `regulator` whose effective date is at or before `as_of`
    pub fn evaluate_at(
        &self,
        data: &DataRecord,
        regulator: &str,
        as_of: DateTime<Utc>,
    ) -> Result<EvaluationBundle> {
        let regulator = normalize_regulator(regulator);
        let rules = self
            .store
            .rules_for(&regulator)
            .ok_or_else(|| ComplianceError::UnknownRegulator(regulator.clone()))?;

        let mut bundle = EvaluationBundle {
            evaluation_id: Uuid::new_v4(),
            regulator: regulator.clone(),
            evaluated_at: as_of,
            data: data.clone(),
            validation_results: Vec::new(),
            calculations: BTreeMap::new(),
            transformations: BTreeMap::new(),
            rule_applications: Vec::with_capacity(rules.len()),
        };

        debug!(
            evaluation_id = %bundle.evaluation_id,
            regulator = %regulator,
            rule_count = rules.len(),
            "Starting evaluation"
        );

        for rule in rules.iter().filter(|rule| rule.is_effective(as_of)) {
            let application = match self.apply_rule(rule, &bundle.data) {
                Ok(outcome) => self.record_outcome(rule, outcome, &mut bundle),
                Err(e) => {
                    warn!(rule = %rule.key, error = %e, "Rule application failed");
                    RuleApplicationResult {
                        key: rule.key.clone(),
                        status: RuleStatus::Error,
                        message: Some(format!("Rule application failed: {}", e)),
                        output: None,
                    }
                }
            };

            if rule.rule_type == RuleType::Validation {
                bundle.validation_results.push(application.clone());
            }
            bundle.rule_applications.push(application);
        }

        let summary = bundle.summary();
        info!(
            evaluation_id = %bundle.evaluation_id,
            regulator = %regulator,
            evaluated = summary.evaluated,
            failed = summary.failed,
            errored = summary.errored,
            "Evaluation completed"
        );

        Ok(bundle)
    }

    /// Fold a successful outcome into the bundle and describe it
    fn record_outcome(
        &self,
        rule: &Rule,
        outcome: RuleOutcome,
        bundle: &mut EvaluationBundle,
    ) -> RuleApplicationResult {
        let (status, message, output) = match outcome {
            RuleOutcome::Validation { status, message } => (status, message, None),
            RuleOutcome::Calculation { value } => {
                bundle
                    .calculations
                    .insert(rule.rule_id().to_string(), value.clone());
                (RuleStatus::Success, None, Some(value))
            }
            RuleOutcome::Transformation { data } => {
                bundle.data = data;
                bundle
                    .transformations
                    .insert(rule.rule_id().to_string(), rule.parameters.clone());
                (RuleStatus::Success, None, None)
            }
            RuleOutcome::Conditional => (RuleStatus::Success, None, None),
        };

        RuleApplicationResult {
            key: rule.key.clone(),
            status,
            message,
            output,
        }
    }

    fn apply_rule(&self, rule: &Rule, data: &DataRecord) -> Result<RuleOutcome> {
        match &rule.action {
            RuleAction::Validation { field, condition } => {
                self.apply_validation(field.as_deref(), condition.as_ref(), data)
            }
            RuleAction::Calculation { function } => {
                let calculation = self.calculations.resolve(function)?;
                let value = calculation.calculate(data, &rule.parameters)?;
                Ok(RuleOutcome::Calculation {
                    value: value.into_value()?,
                })
            }
            RuleAction::Transformation { transform } => {
                self.apply_transformation(transform, rule, data)
            }
            RuleAction::Conditional => Ok(RuleOutcome::Conditional),
        }
    }

    fn apply_validation(
        &self,
        field: Option<&str>,
        condition: Option<&ValidationCondition>,
        data: &DataRecord,
    ) -> Result<RuleOutcome> {
        let passed = Ok(RuleOutcome::Validation {
            status: RuleStatus::Passed,
            message: None,
        });

        let (Some(field), Some(condition)) = (field, condition) else {
            return passed;
        };

        let present = !matches!(data.get(field), None | Some(Value::Null));

        match condition {
            ValidationCondition::Required if !present => Ok(RuleOutcome::Validation {
                status: RuleStatus::Failed,
                message: Some(format!("{} is required", field)),
            }),
            ValidationCondition::Positive if present => {
                if numeric_field(data, field, 0.0)? < 0.0 {
                    Ok(RuleOutcome::Validation {
                        status: RuleStatus::Failed,
                        message: Some(format!("{} must be positive", field)),
                    })
                } else {
                    passed
                }
            }
            ValidationCondition::Other(name) => match self.unknown_condition_policy {
                UnknownNamePolicy::Strict => Err(ComplianceError::UnknownCondition(name.clone())),
                UnknownNamePolicy::Permissive => passed,
            },
            _ => passed,
        }
    }

    fn apply_transformation(
        &self,
        transform: &str,
        rule: &Rule,
        data: &DataRecord,
    ) -> Result<RuleOutcome> {
        let transformation = match self.transformations.resolve(transform) {
            Ok(transformation) => transformation,
            Err(e) => match self.unknown_transformation_policy {
                UnknownNamePolicy::Strict => return Err(e),
                UnknownNamePolicy::Permissive => {
                    debug!(rule = %rule.key, transform, "Unknown transformation left data unchanged");
                    return Ok(RuleOutcome::Transformation { data: data.clone() });
                }
            },
        };

        let mut transformed = data.clone();
        transformation.apply(&mut transformed, &rule.parameters)?;
        Ok(RuleOutcome::Transformation { data: transformed })
    }
}
