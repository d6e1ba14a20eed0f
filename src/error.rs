//! Error types for the regulatory rule engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ComplianceError>;

#[derive(Error, Debug)]
pub enum ComplianceError {

    // =============================
    // Rule Loading Errors
    // =============================

    #[error("Malformed rule at index {index}: {reason}")]
    MalformedRule { index: usize, reason: String },

    #[error("Invalid rule type at index {index}: '{value}' (expected validation, calculation, transformation or conditional)")]
    InvalidRuleType { index: usize, value: String },

    // =============================
    // Evaluation Errors
    // =============================

    #[error("No rules found for regulator: {0}")]
    UnknownRegulator(String),

    #[error("Unknown calculation: {name} (known: {})", .known.join(", "))]
    UnknownCalculation { name: String, known: Vec<String> },

    #[error("Unknown transformation: {name} (known: {})", .known.join(", "))]
    UnknownTransformation { name: String, known: Vec<String> },

    #[error("Unknown validation condition: {0}")]
    UnknownCondition(String),

    #[error("Rule evaluation fault: {0}")]
    RuleEvaluationFault(String),

    // =============================
    // Configuration
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
