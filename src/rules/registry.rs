//! Calculation and transformation registries
//!
//! Calculations are pure functions over the data snapshot. Transformations
//! rewrite the snapshot. Both are looked up by the rule's expression name;
//! the set of names is fixed once the engine is built.

use crate::error::ComplianceError;
use crate::models::{DataRecord, Parameters};
use crate::Result;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A named derived metric
pub trait Calculation: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn calculate(&self, data: &DataRecord, parameters: &Parameters) -> Result<Amount>;
}

/// A named rewrite of the data snapshot
pub trait Transformation: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn apply(&self, data: &mut DataRecord, parameters: &Parameters) -> Result<()>;
}

pub struct CalculationRegistry {
    calculations: HashMap<String, Arc<dyn Calculation>>,
}

impl CalculationRegistry {
    pub fn new() -> Self {
        Self {
            calculations: HashMap::new(),
        }
    }

    pub fn register(&mut self, calculation: Arc<dyn Calculation>) {
        self.calculations
            .insert(calculation.name().to_string(), calculation);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Calculation>> {
        self.calculations.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.calculations.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Name → description of every registered calculation
    pub fn catalog(&self) -> BTreeMap<&'static str, &'static str> {
        self.calculations
            .values()
            .map(|calculation| (calculation.name(), calculation.description()))
            .collect()
    }

    /// Look up `name` or fail with the list of known calculations
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Calculation>> {
        self.get(name).ok_or_else(|| ComplianceError::UnknownCalculation {
            name: name.to_string(),
            known: self.list().into_iter().map(String::from).collect(),
        })
    }
}

impl Default for CalculationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TransformationRegistry {
    transformations: HashMap<String, Arc<dyn Transformation>>,
}

impl TransformationRegistry {
    pub fn new() -> Self {
        Self {
            transformations: HashMap::new(),
        }
    }

    pub fn register(&mut self, transformation: Arc<dyn Transformation>) {
        self.transformations
            .insert(transformation.name().to_string(), transformation);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transformation>> {
        self.transformations.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transformations.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn catalog(&self) -> BTreeMap<&'static str, &'static str> {
        self.transformations
            .values()
            .map(|transformation| (transformation.name(), transformation.description()))
            .collect()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Transformation>> {
        self.get(name).ok_or_else(|| ComplianceError::UnknownTransformation {
            name: name.to_string(),
            known: self.list().into_iter().map(String::from).collect(),
        })
    }
}

impl Default for TransformationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A number taken from or written to a data record. Integers stay integral
/// through subtraction and multiplication; anything else widens to `Real`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amount {
    Integer(i64),
    Real(f64),
}

impl Amount {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_i64() {
            Some(i) => Some(Amount::Integer(i)),
            None => value.as_f64().map(Amount::Real),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Amount::Integer(i) => i as f64,
            Amount::Real(r) => r,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    pub fn sub(self, other: Amount) -> Amount {
        match (self, other) {
            (Amount::Integer(a), Amount::Integer(b)) => a
                .checked_sub(b)
                .map(Amount::Integer)
                .unwrap_or_else(|| Amount::Real(a as f64 - b as f64)),
            _ => Amount::Real(self.as_f64() - other.as_f64()),
        }
    }

    pub fn mul(self, other: Amount) -> Amount {
        match (self, other) {
            (Amount::Integer(a), Amount::Integer(b)) => a
                .checked_mul(b)
                .map(Amount::Integer)
                .unwrap_or_else(|| Amount::Real(a as f64 * b as f64)),
            _ => Amount::Real(self.as_f64() * other.as_f64()),
        }
    }

    /// Always a real quotient
    pub fn div(self, other: Amount) -> Amount {
        Amount::Real(self.as_f64() / other.as_f64())
    }

    pub fn into_value(self) -> Result<Value> {
        match self {
            Amount::Integer(i) => Ok(Value::Number(Number::from(i))),
            Amount::Real(r) => Number::from_f64(r).map(Value::Number).ok_or_else(|| {
                ComplianceError::RuleEvaluationFault(format!("non-finite result: {}", r))
            }),
        }
    }
}

/// Amount held in `field`; absent or null yields `default`
pub fn amount_field(data: &DataRecord, field: &str, default: Amount) -> Result<Amount> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => Amount::from_value(value).ok_or_else(|| {
            ComplianceError::RuleEvaluationFault(format!(
                "field '{}' is not numeric: {}",
                field, value
            ))
        }),
    }
}

/// Numeric value of `field`; absent or null yields `default`
pub fn numeric_field(data: &DataRecord, field: &str, default: f64) -> Result<f64> {
    amount_field(data, field, Amount::Real(default)).map(Amount::as_f64)
}

//
// ========== Built-in Calculations ==========
//

/// total_debt / total_equity; zero equity yields the integer 0
pub struct DebtToEquityRatio;

impl Calculation for DebtToEquityRatio {
    fn name(&self) -> &'static str {
        "debt_to_equity_ratio"
    }

    fn description(&self) -> &'static str {
        "Total debt divided by total equity"
    }

    fn calculate(&self, data: &DataRecord, _parameters: &Parameters) -> Result<Amount> {
        let debt = amount_field(data, "total_debt", Amount::Integer(0))?;
        let equity = amount_field(data, "total_equity", Amount::Integer(1))?;

        if equity.is_zero() {
            Ok(Amount::Integer(0))
        } else {
            Ok(debt.div(equity))
        }
    }
}

pub struct WorkingCapital;

impl Calculation for WorkingCapital {
    fn name(&self) -> &'static str {
        "working_capital"
    }

    fn description(&self) -> &'static str {
        "Current assets minus current liabilities"
    }

    fn calculate(&self, data: &DataRecord, _parameters: &Parameters) -> Result<Amount> {
        let assets = amount_field(data, "current_assets", Amount::Integer(0))?;
        let liabilities = amount_field(data, "current_liabilities", Amount::Integer(0))?;
        Ok(assets.sub(liabilities))
    }
}

//
// ========== Built-in Transformations ==========
//

/// Multiplies every field named in `parameters.fields` by `parameters.rate`
pub struct StandardizeCurrency;

impl Transformation for StandardizeCurrency {
    fn name(&self) -> &'static str {
        "standardize_currency"
    }

    fn description(&self) -> &'static str {
        "Convert listed amount fields using a fixed rate"
    }

    fn apply(&self, data: &mut DataRecord, parameters: &Parameters) -> Result<()> {
        let rate = match parameters.get("rate") {
            None | Some(Value::Null) => Amount::Real(1.0),
            Some(value) => Amount::from_value(value).ok_or_else(|| {
                ComplianceError::RuleEvaluationFault(format!("rate is not numeric: {}", value))
            })?,
        };

        let fields = match parameters.get("fields") {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Array(fields)) => fields,
            Some(other) => {
                return Err(ComplianceError::RuleEvaluationFault(format!(
                    "fields must be a list, got {}",
                    other
                )))
            }
        };

        for field in fields {
            let Some(field) = field.as_str() else {
                return Err(ComplianceError::RuleEvaluationFault(format!(
                    "field names must be strings, got {}",
                    field
                )));
            };

            if matches!(data.get(field), None | Some(Value::Null)) {
                continue;
            }

            let amount = amount_field(data, field, Amount::Integer(0))?;
            data.insert(field.to_string(), amount.mul(rate).into_value()?);
        }

        Ok(())
    }
}

/// Registry holding the built-in calculations
pub fn create_default_calculations() -> CalculationRegistry {
    let mut registry = CalculationRegistry::new();
    registry.register(Arc::new(DebtToEquityRatio));
    registry.register(Arc::new(WorkingCapital));
    registry
}

pub fn create_default_transformations() -> TransformationRegistry {
    let mut registry = TransformationRegistry::new();
    registry.register(Arc::new(StandardizeCurrency));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> DataRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_debt_to_equity_guards_zero_equity() {
        let calc = DebtToEquityRatio;
        let params = Parameters::new();

        let zero = record(json!({"total_debt": 200, "total_equity": 0}));
        assert_eq!(calc.calculate(&zero, &params).unwrap(), Amount::Integer(0));

        let normal = record(json!({"total_debt": 200, "total_equity": 400}));
        assert_eq!(calc.calculate(&normal, &params).unwrap(), Amount::Real(0.5));

        let missing_equity = record(json!({"total_debt": 200}));
        assert_eq!(calc.calculate(&missing_equity, &params).unwrap(), Amount::Real(200.0));
    }

    #[test]
    fn test_working_capital() {
        let data = record(json!({"current_assets": 1500.5, "current_liabilities": 500}));
        assert_eq!(
            WorkingCapital.calculate(&data, &Parameters::new()).unwrap(),
            Amount::Real(1000.5)
        );
    }

    #[test]
    fn test_integer_inputs_stay_integral() {
        let data = record(json!({"current_assets": 50, "current_liabilities": 20}));
        let result = WorkingCapital.calculate(&data, &Parameters::new()).unwrap();

        assert_eq!(result, Amount::Integer(30));
        assert_eq!(result.into_value().unwrap(), json!(30));

        let mut amounts = record(json!({"amount": 100}));
        StandardizeCurrency
            .apply(&mut amounts, &record(json!({"fields": ["amount"], "rate": 2})))
            .unwrap();
        assert_eq!(amounts["amount"], json!(200));
    }

    #[test]
    fn test_integer_overflow_widens() {
        let big = Amount::Integer(i64::MAX);
        assert_eq!(big.mul(Amount::Integer(2)), Amount::Real(i64::MAX as f64 * 2.0));
        assert!(Amount::Real(f64::NAN).into_value().is_err());
    }

    #[test]
    fn test_catalog_describes_builtins() {
        let calculations = create_default_calculations().catalog();
        assert_eq!(
            calculations.get("working_capital"),
            Some(&"Current assets minus current liabilities")
        );
        assert_eq!(calculations.len(), 2);

        let transformations = create_default_transformations().catalog();
        assert!(transformations.contains_key("standardize_currency"));
    }

    #[test]
    fn test_non_numeric_input_is_fault() {
        let data = record(json!({"total_debt": "lots"}));
        let err = DebtToEquityRatio
            .calculate(&data, &Parameters::new())
            .unwrap_err();
        assert!(matches!(err, ComplianceError::RuleEvaluationFault(_)));
    }

    #[test]
    fn test_resolve_unknown_lists_known() {
        let registry = create_default_calculations();
        assert_eq!(registry.list(), vec!["debt_to_equity_ratio", "working_capital"]);

        match registry.resolve("ebitda") {
            Err(ComplianceError::UnknownCalculation { name, known }) => {
                assert_eq!(name, "ebitda");
                assert_eq!(known.len(), 2);
            }
            _ => panic!("expected UnknownCalculation"),
        }
    }

    #[test]
    fn test_standardize_currency() {
        let mut data = record(json!({"revenue": 100, "assets": 10, "name": "ACME"}));
        let params = record(json!({"fields": ["revenue", "missing"], "rate": 1.5}));

        StandardizeCurrency.apply(&mut data, &params).unwrap();
        assert_eq!(data["revenue"].as_f64(), Some(150.0));
        assert_eq!(data["assets"], json!(10));
        assert!(!data.contains_key("missing"));
    }

    #[test]
    fn test_standardize_currency_default_rate_and_bad_params() {
        let mut data = record(json!({"revenue": 100}));
        StandardizeCurrency
            .apply(&mut data, &record(json!({"fields": ["revenue"]})))
            .unwrap();
        assert_eq!(data["revenue"].as_f64(), Some(100.0));

        let bad_rate = record(json!({"fields": ["revenue"], "rate": "fx"}));
        assert!(StandardizeCurrency.apply(&mut data, &bad_rate).is_err());

        let mut text = record(json!({"revenue": "n/a"}));
        let params = record(json!({"fields": ["revenue"]}));
        assert!(StandardizeCurrency.apply(&mut text, &params).is_err());
    }
}
