//! Regulatory Rule Engine
//!
//! Turns regulatory text into structured interpretations and applies
//! versioned, regulator-scoped rules to financial data:
//! - Interprets free-form regulation into typed requirements with a confidence score
//! - Compares two versions of a passage and grades the impact of the change
//! - Loads rule definitions in bulk, rejecting bad records individually
//! - Evaluates validations, calculations and transformations in load order
//! - Records every evaluation in a hash-verified audit log
//!
//! FLOW:
//! TEXT → INTERPRET → (RULES) → EVALUATE → AUDIT

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod models;
pub mod rules;

pub use error::Result;

// Re-export common types
pub use config::{EngineConfig, UnknownNamePolicy};
pub use engine::RuleEngine;
pub use error::ComplianceError;
pub use interpreter::Interpreter;
pub use models::*;
pub use rules::{Rule, RuleAction, RuleStore};
