//! Regulatory text interpreter
//!
//! Turns free-form regulatory text into a structured `Interpretation`.
//!
//! PIPELINE:
//! NORMALIZE → CLASSIFY → EXTRACT → ENHANCE → SYNTHESIZE
//!
//! Every stage is total: text without recognisable structure degrades to
//! empty components and a REQUIREMENT reading, never to an error.

pub mod cache;
pub mod change;
pub mod classifier;
pub mod patterns;

use crate::config::EngineConfig;
use crate::models::{Interpretation, InterpretationType};
use crate::rules::parse_timestamp;
use cache::{CacheKey, InterpretationCache};
use change::ChangeReport;
use chrono::Utc;
use classifier::InterpretationClassifier;
use patterns::{
    capture_all, domain_knowledge, ABBREVIATIONS, AMBIGUITY_MARKERS, CALCULATION_PATTERNS,
    DATA_FIELD_PATTERNS, DEADLINE_PATTERNS, EXEMPTION_PATTERNS, PROHIBITION_PATTERNS,
    REQUIREMENT_PATTERNS, SECTION_REFERENCE, SECTION_SIGN, WHITESPACE,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Raw material extracted from one passage, kept in metadata for audit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub actions: Vec<String>,
    pub prohibited_actions: Vec<String>,
    pub conditions: Vec<String>,
    pub data_fields: Vec<String>,
    pub deadlines: Vec<String>,
    pub entities: Vec<String>,
    pub calculations: Vec<String>,
    pub specific_forms: Vec<String>,
    pub calculation_formulas: BTreeMap<String, String>,
    pub concepts: Vec<String>,
    /// Regulator thresholds whose metric the text mentions
    pub thresholds: BTreeMap<String, u64>,
}

impl Components {
    /// Stage 3: pattern extraction. Duplicates are kept.
    pub fn extract(text: &str, interpretation_type: InterpretationType) -> Self {
        let mut components = Components {
            actions: capture_all(&REQUIREMENT_PATTERNS, "action", text),
            prohibited_actions: capture_all(&PROHIBITION_PATTERNS, "action", text),
            conditions: capture_all(&EXEMPTION_PATTERNS, "condition", text),
            data_fields: capture_all(&DATA_FIELD_PATTERNS, "field", text),
            entities: capture_all(&EXEMPTION_PATTERNS, "entity", text),
            ..Default::default()
        };

        components.deadlines = DEADLINE_PATTERNS
            .iter()
            .flat_map(|pattern| pattern.find_iter(text))
            .map(|m| m.as_str().trim().to_string())
            .collect();

        if interpretation_type == InterpretationType::Calculation {
            components.calculations = capture_all(&CALCULATION_PATTERNS, "formula", text);
        }

        components
    }

    /// Stage 4: attach regulator-specific forms, formulas and concepts
    pub fn enhance(&mut self, regulator: &str, text: &str) {
        let Some(domain) = domain_knowledge(regulator) else {
            return;
        };

        let action_text = self.actions.join(" ").to_lowercase();
        for form in domain.forms {
            if action_text.contains(&form.to_lowercase()) {
                self.specific_forms.push(form.to_string());
            }
        }

        for calculation in &self.calculations {
            let calculation = calculation.to_lowercase();
            for (name, formula) in domain.calculations {
                if calculation.contains(name) {
                    self.calculation_formulas
                        .insert(name.to_string(), formula.to_string());
                }
            }
        }

        let lowered = text.to_lowercase();
        for concept in domain.concepts {
            if lowered.contains(&concept.to_lowercase()) {
                self.concepts.push(concept.to_string());
            }
        }

        for threshold in domain.thresholds {
            if lowered.contains(threshold.metric) {
                self.thresholds
                    .insert(threshold.name.to_string(), threshold.value);
            }
        }
    }
}

/// Interprets regulatory passages and owns the interpretation cache
pub struct Interpreter {
    cache: InterpretationCache,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            cache: InterpretationCache::new(config.cache_capacity, config.cache_ttl()),
        }
    }

    /// Interpret `text` issued by `regulator`.
    ///
    /// Always runs the full pipeline; the result is written to the cache
    /// and can later be fetched with [`Interpreter::cached`]. A context
    /// value may carry an `effective_date` (ISO-8601) for the reading.
    pub fn interpret(
        &self,
        text: &str,
        regulator: &str,
        context: Option<&Value>,
    ) -> Arc<Interpretation> {
        info!(regulator = %regulator, length = text.len(), "Interpreting regulation");

        let normalized = normalize(text);
        let interpretation_type = InterpretationClassifier::classify(&normalized);

        let mut components = Components::extract(&normalized, interpretation_type);
        components.enhance(regulator, &normalized);

        let content_hash = content_hash(text);

        let mut interpretation = synthesize(
            text,
            &normalized,
            interpretation_type,
            &components,
            regulator,
            &content_hash,
            context,
        );
        interpretation.confidence_score = confidence_score(&interpretation);

        debug!(
            regulation_id = %interpretation.regulation_id,
            interpretation_type = %interpretation.interpretation_type,
            confidence = interpretation.confidence_score,
            "Interpretation completed"
        );

        let interpretation = Arc::new(interpretation);
        self.cache.insert(
            CacheKey::new(regulator, content_hash),
            Arc::clone(&interpretation),
        );

        interpretation
    }

    /// Previously produced interpretation of exactly this text, if still cached
    pub fn cached(&self, regulator: &str, text: &str) -> Option<Arc<Interpretation>> {
        self.cache.get(&CacheKey::new(regulator, content_hash(text)))
    }

    pub fn cache(&self) -> &InterpretationCache {
        &self.cache
    }

    /// Interpret both versions independently and diff them
    pub fn analyze_regulatory_change(
        &self,
        old_text: &str,
        new_text: &str,
        regulator: &str,
    ) -> ChangeReport {
        let old = self.interpret(old_text, regulator, None);
        let new = self.interpret(new_text, regulator, None);

        let report = ChangeReport::between(regulator, &old, &new);

        info!(
            regulator = %regulator,
            impact = %report.impact_assessment,
            "Regulatory change analyzed"
        );

        report
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Stage 1: collapse whitespace, spell out section signs, expand
/// abbreviations. Abbreviations are replaced as plain substrings.
pub fn normalize(text: &str) -> String {
    let mut normalized = WHITESPACE.replace_all(text, " ").into_owned();
    normalized = SECTION_SIGN
        .replace_all(&normalized, "Section $1")
        .into_owned();

    for (abbreviation, expansion) in ABBREVIATIONS {
        normalized = normalized.replace(abbreviation, expansion);
    }

    normalized.trim().to_string()
}

/// Hex SHA-256 of the text as received
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Stage 5: assemble the record (confidence is scored separately)
fn synthesize(
    original_text: &str,
    normalized: &str,
    interpretation_type: InterpretationType,
    components: &Components,
    regulator: &str,
    content_hash: &str,
    context: Option<&Value>,
) -> Interpretation {
    let data_requirements: BTreeSet<String> = components.data_fields.iter().cloned().collect();

    let calculation_formula = if components.calculation_formulas.is_empty() {
        None
    } else {
        Some(components.calculation_formulas.clone())
    };

    let section = SECTION_REFERENCE
        .captures(normalized)
        .and_then(|caps| caps.name("section"))
        .map(|m| format!("Section {}", m.as_str()))
        .unwrap_or_else(|| "TBD".to_string());

    let now = Utc::now();
    let effective_date = context
        .and_then(|ctx| ctx.get("effective_date"))
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or(now);

    let metadata = json!({
        "regulator": regulator,
        "interpretation_timestamp": now.to_rfc3339(),
        "normalized_text": normalized,
        "components": components,
        "context": context.cloned().unwrap_or_else(|| json!({})),
    });

    Interpretation {
        regulation_id: format!("{}_{}", regulator, &content_hash[..16]),
        section,
        interpretation_type,
        original_text: original_text.to_string(),
        interpreted_meaning: build_interpreted_meaning(interpretation_type, components),
        data_requirements,
        calculation_formula,
        conditions: components.conditions.clone(),
        effective_date,
        confidence_score: 0.0,
        metadata,
    }
}

/// Human-readable summary, one fixed template per type
pub fn build_interpreted_meaning(
    interpretation_type: InterpretationType,
    components: &Components,
) -> String {
    match interpretation_type {
        InterpretationType::Requirement => {
            let actions = join_or(&components.actions, ", ", "perform required actions");
            if components.data_fields.is_empty() {
                format!("Must {}", actions)
            } else {
                format!(
                    "Must {} and report {}",
                    actions,
                    components.data_fields.join(", ")
                )
            }
        }
        InterpretationType::Prohibition => {
            let actions = if components.prohibited_actions.is_empty() {
                &components.actions
            } else {
                &components.prohibited_actions
            };
            format!(
                "Prohibited from {}",
                join_or(actions, ", ", "perform prohibited actions")
            )
        }
        InterpretationType::Calculation => format!(
            "Calculate values using: {}",
            join_or(&components.calculations, ", ", "specified calculations")
        ),
        InterpretationType::Exemption => format!(
            "Exemption applies if: {}",
            join_or(&components.conditions, "; ", "specified conditions")
        ),
        InterpretationType::Definition | InterpretationType::Process => {
            "Interpretation requires manual review".to_string()
        }
    }
}

fn join_or(items: &[String], separator: &str, fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(separator)
    }
}

/// Heuristic [0, 1] score of how well-structured the extraction was.
///
/// Each distinct ambiguity marker found anywhere in the lower-cased original
/// text costs 0.05, including inside longer words ("may" in "mayor").
pub fn confidence_score(interpretation: &Interpretation) -> f64 {
    let mut score = 0.5;

    if !interpretation.data_requirements.is_empty() {
        score += 0.1 * interpretation.data_requirements.len().min(3) as f64;
    }
    if !interpretation.conditions.is_empty() {
        score += 0.1 * interpretation.conditions.len().min(2) as f64;
    }
    if interpretation.calculation_formula.is_some() {
        score += 0.2;
    }

    let lowered = interpretation.original_text.to_lowercase();
    for marker in AMBIGUITY_MARKERS {
        if lowered.contains(marker) {
            score -= 0.05;
        }
    }

    score.clamp(0.0, 1.0)
}
