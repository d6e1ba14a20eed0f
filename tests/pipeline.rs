//! End-to-end: interpret a passage, load rules from disk, evaluate and audit.

use std::io::Write;
use std::sync::Arc;

use regulatory_rule_engine::{
    audit::AuditLog,
    config::{EngineConfig, UnknownNamePolicy},
    engine::RuleEngine,
    interpreter::Interpreter,
    models::{DataRecord, InterpretationType, RiskLevel, RuleStatus},
    rules::{parse_timestamp, RuleStore},
    ComplianceError,
};
use serde_json::json;
use tempfile::NamedTempFile;

fn rules_file() -> NamedTempFile {
    let rules = json!([
        {
            "rule_id": "SEC-V-001",
            "regulator": "SEC",
            "rule_type": "validation",
            "description": "Revenue must be positive",
            "expression": "revenue > 0",
            "parameters": {"field": "revenue", "condition": "positive"},
            "version": "1.0",
            "effective_date": "2024-01-01T00:00:00"
        },
        {
            "rule_id": "SEC-T-001",
            "regulator": "SEC",
            "rule_type": "transformation",
            "description": "Convert reported amounts to USD",
            "expression": "standardize_currency",
            "parameters": {"fields": ["total_debt", "total_equity"], "rate": 2},
            "version": "1.0",
            "effective_date": "2024-01-01"
        },
        {
            "rule_id": "SEC-C-001",
            "regulator": "SEC",
            "rule_type": "calculation",
            "description": "Leverage",
            "expression": "debt_to_equity_ratio",
            "parameters": {},
            "version": "1.0",
            "effective_date": "2024-01-01"
        },
        {
            "rule_id": "SEC-X-001",
            "regulator": "SEC",
            "rule_type": "scoring",
            "description": "Not a supported rule type",
            "expression": "score",
            "version": "1.0",
            "effective_date": "2024-01-01"
        },
        {
            "rule_id": "FCA-C-001",
            "regulator": "FCA",
            "rule_type": "calculation",
            "description": "Liquidity",
            "expression": "working_capital",
            "version": "1.0",
            "effective_date": "2026-01-01"
        }
    ]);

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", rules).unwrap();
    file
}

fn record(value: serde_json::Value) -> DataRecord {
    value.as_object().cloned().unwrap()
}

#[test]
fn interpret_load_evaluate_audit() {
    let config = EngineConfig::default();

    let interpreter = Interpreter::with_config(&config);
    let interpretation = interpreter.interpret(
        "Under § 13, issuers shall report revenue within 30 days.",
        "SEC",
        Some(&json!({"effective_date": "2024-01-01"})),
    );
    assert_eq!(interpretation.interpretation_type, InterpretationType::Requirement);
    assert_eq!(interpretation.section, "Section 13");
    assert!(interpretation.data_requirements.contains("revenue"));
    assert!(interpreter
        .cached("sec", "Under § 13, issuers shall report revenue within 30 days.")
        .is_some());

    let file = rules_file();
    let store = Arc::new(RuleStore::new());
    let report = store.load_from_path(file.path()).unwrap();
    assert_eq!(report.loaded, 4);
    assert_eq!(report.rejected.len(), 1);
    assert!(matches!(
        report.rejected[0],
        ComplianceError::InvalidRuleType { index: 3, .. }
    ));
    assert!(store.validate_consistency().is_empty());

    let engine = RuleEngine::with_config(Arc::clone(&store), &config);
    let input = record(json!({"revenue": 1200, "total_debt": 300, "total_equity": 600}));
    let bundle = engine.evaluate(&input, "sec").unwrap();

    let ids: Vec<&str> = bundle.rule_applications.iter().map(|a| a.rule_id()).collect();
    assert_eq!(ids, vec!["SEC-V-001", "SEC-T-001", "SEC-C-001"]);
    assert_eq!(bundle.validation_results[0].status, RuleStatus::Passed);
    assert_eq!(bundle.data["total_debt"].as_f64(), Some(600.0));
    assert_eq!(bundle.calculations["SEC-C-001"].as_f64(), Some(0.5));
    assert!(bundle.is_compliant());

    let audit = AuditLog::new(config.audit_capacity);
    let audit_id = audit.record(&input, &bundle);
    assert!(audit.verify_integrity(audit_id));
    assert_eq!(audit.list_for_regulator("SEC"), vec![audit_id]);
}

#[test]
fn rules_not_yet_effective_are_skipped() {
    let file = rules_file();
    let store = Arc::new(RuleStore::new());
    store.load_from_path(file.path()).unwrap();
    let engine = RuleEngine::new(store);

    let input = record(json!({"current_assets": 10, "current_liabilities": 4}));

    let before = engine
        .evaluate_at(&input, "FCA", parse_timestamp("2025-12-31").unwrap())
        .unwrap();
    assert!(before.rule_applications.is_empty());
    assert!(before.calculations.is_empty());

    let after = engine
        .evaluate_at(&input, "FCA", parse_timestamp("2026-01-01").unwrap())
        .unwrap();
    assert_eq!(after.calculations["FCA-C-001"], json!(6));
}

#[test]
fn permissive_engine_tolerates_unknown_names() {
    let store = Arc::new(RuleStore::new());
    store
        .load_json(
            &json!([{
                "rule_id": "ESMA-V-001",
                "regulator": "ESMA",
                "rule_type": "validation",
                "description": "Audited figures",
                "expression": "",
                "parameters": {"field": "nav", "condition": "audited"},
                "version": "2.0",
                "effective_date": "2024-01-01"
            }])
            .to_string(),
        )
        .unwrap();

    let config = EngineConfig::from_lookup(|key| match key {
        "REGENGINE_UNKNOWN_CONDITION_POLICY" => Some("permissive".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.unknown_condition_policy, UnknownNamePolicy::Permissive);

    let engine = RuleEngine::with_config(store, &config);
    let bundle = engine.evaluate(&record(json!({"nav": 1})), "ESMA").unwrap();
    assert_eq!(bundle.rule_applications[0].status, RuleStatus::Passed);
}

#[test]
fn change_analysis_flags_new_prohibition() {
    let interpreter = Interpreter::new();
    let report = interpreter.analyze_regulatory_change(
        "Firms must report revenue quarterly.",
        "Firms must not engage in short selling.",
        "FCA",
    );

    assert!(report.type_changed);
    assert_eq!(report.impact_assessment.level, RiskLevel::High);
}

#[test]
fn missing_rules_file_is_io_error() {
    let store = RuleStore::new();
    let dir = tempfile::tempdir().unwrap();
    let err = store.load_from_path(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ComplianceError::IoError(_)));
}
