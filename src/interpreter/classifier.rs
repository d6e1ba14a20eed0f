//! Interpretation Classifier
//!
//! Assigns exactly one interpretation type to normalized regulatory text.
//! Categories are tried in a fixed priority order and the first hit wins:
//! CALCULATION, PROHIBITION, EXEMPTION, PROCESS, DEFINITION, then REQUIREMENT
//! as the catch-all.

use crate::interpreter::patterns::{
    any_match, CALCULATION_PATTERNS, EXEMPTION_PATTERNS, PROHIBITION_PATTERNS,
};
use crate::models::InterpretationType;

/// Static keyword lists, no allocation
const PROCESS_KEYWORDS: &[&str] = &["procedure", "process", "steps"];

const DEFINITION_KEYWORDS: &[&str] = &["means", "defined as"];

/// Interpretation classifier
pub struct InterpretationClassifier;

impl InterpretationClassifier {
    pub fn classify(text: &str) -> InterpretationType {
        let text = text.to_lowercase();

        if any_match(&CALCULATION_PATTERNS, &text) {
            InterpretationType::Calculation
        } else if any_match(&PROHIBITION_PATTERNS, &text) {
            InterpretationType::Prohibition
        } else if any_match(&EXEMPTION_PATTERNS, &text) {
            InterpretationType::Exemption
        } else if contains_any(&text, PROCESS_KEYWORDS) {
            InterpretationType::Process
        } else if contains_any(&text, DEFINITION_KEYWORDS) {
            InterpretationType::Definition
        } else {
            InterpretationType::Requirement
        }
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}
