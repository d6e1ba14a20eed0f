//! Regulatory change analysis
//!
//! Diffs two interpretations of successive versions of a passage.

use crate::models::{Interpretation, InterpretationType, RiskLevel};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactAssessment {
    pub level: RiskLevel,
    pub reason: String,
}

impl fmt::Display for ImpactAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.reason)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeReport {
    pub regulator: String,
    pub old_type: InterpretationType,
    pub new_type: InterpretationType,
    pub type_changed: bool,
    /// Sorted, present now but not before
    pub new_requirements: Vec<String>,
    /// Sorted, present before but not now
    pub removed_requirements: Vec<String>,
    pub calculation_changed: bool,
    pub conditions_changed: bool,
    pub impact_assessment: ImpactAssessment,
}

impl ChangeReport {
    pub fn between(regulator: &str, old: &Interpretation, new: &Interpretation) -> Self {
        let new_requirements = new
            .data_requirements
            .difference(&old.data_requirements)
            .cloned()
            .collect();
        let removed_requirements = old
            .data_requirements
            .difference(&new.data_requirements)
            .cloned()
            .collect();

        Self {
            regulator: regulator.to_string(),
            old_type: old.interpretation_type,
            new_type: new.interpretation_type,
            type_changed: old.interpretation_type != new.interpretation_type,
            new_requirements,
            removed_requirements,
            calculation_changed: old.calculation_formula != new.calculation_formula,
            conditions_changed: old.conditions != new.conditions,
            impact_assessment: assess_change_impact(old, new),
        }
    }
}

/// Severity by fixed precedence: new prohibition, more requirements,
/// changed formula, otherwise low.
pub fn assess_change_impact(old: &Interpretation, new: &Interpretation) -> ImpactAssessment {
    let (level, reason) = if new.interpretation_type == InterpretationType::Prohibition
        && old.interpretation_type != InterpretationType::Prohibition
    {
        (RiskLevel::High, "New prohibition introduced")
    } else if new.data_requirements.len() > old.data_requirements.len() {
        (RiskLevel::Medium, "Additional reporting requirements")
    } else if new.calculation_formula != old.calculation_formula {
        (RiskLevel::Medium, "Calculation methodology changed")
    } else {
        (RiskLevel::Low, "Minor changes")
    };

    ImpactAssessment {
        level,
        reason: reason.to_string(),
    }
}
