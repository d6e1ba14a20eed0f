//! regengine command line
//!
//! Interprets regulatory text, diffs two versions of a passage, checks a
//! rules file and evaluates financial data against it. Results go to
//! stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use regulatory_rule_engine::{
    audit::AuditLog,
    config::EngineConfig,
    engine::RuleEngine,
    error::ComplianceError,
    interpreter::Interpreter,
    models::{DataRecord, EvaluationBundle},
    rules::{
        create_default_calculations, create_default_transformations, parse_timestamp,
        ConsistencyIssue, LoadReport, RuleStore,
    },
    Result,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Regulatory interpretation and rule evaluation toolkit
const EXIT_OK: u8 = 0;
const EXIT_ERROR: u8 = 1;
/// Evaluation not compliant, or the rules file has rejects or duplicates
const EXIT_FINDINGS: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "regengine", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interpret one regulatory passage.
    Interpret(InterpretArgs),

    /// Compare two versions of a passage and assess the impact.
    Diff(DiffArgs),

    /// Evaluate a data record against a regulator's rules.
    Evaluate(EvaluateArgs),

    /// Load a rules file and report rejected records and duplicate ids.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct InterpretArgs {
    /// Regulator code (SEC, FCA, ESMA, ...).
    #[arg(short, long)]
    regulator: String,

    /// Text to interpret. Read from --file when omitted.
    #[arg(short, long, conflicts_with = "file")]
    text: Option<String>,

    /// File holding the text to interpret.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Effective date of the passage (ISO-8601).
    #[arg(long)]
    effective_date: Option<String>,
}

#[derive(Args, Debug)]
struct DiffArgs {
    #[arg(short, long)]
    regulator: String,

    /// File holding the previous text.
    #[arg(long)]
    old: PathBuf,

    /// File holding the amended text.
    #[arg(long)]
    new: PathBuf,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    #[arg(short, long)]
    regulator: String,

    /// JSON file holding one data record (an object).
    #[arg(short, long)]
    data: PathBuf,

    /// Rules file. Defaults to REGENGINE_RULES_PATH.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Evaluate as of this instant instead of now (ISO-8601).
    #[arg(long)]
    as_of: Option<String>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Rules file. Defaults to REGENGINE_RULES_PATH.
    #[arg(long)]
    rules: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = log_directive(cli.verbose, rust_log.as_deref(), &config.log_level);
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    debug!(?config, "regengine starting");

    let result = match cli.command {
        Commands::Interpret(args) => run_interpret(&args, &config),
        Commands::Diff(args) => run_diff(&args, &config),
        Commands::Evaluate(args) => run_evaluate(&args, &config),
        Commands::Check(args) => run_check(&args, &config),
    };

    if let Err(e) = &result {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
    }

    ExitCode::from(exit_code(&result))
}

/// `-v` flags win, then `RUST_LOG`, then the configured level
fn log_directive<'a>(verbose: u8, rust_log: Option<&'a str>, configured: &'a str) -> &'a str {
    match verbose {
        0 => rust_log
            .filter(|directive| !directive.trim().is_empty())
            .unwrap_or(configured),
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn exit_code(result: &Result<u8>) -> u8 {
    match result {
        Ok(code) => *code,
        Err(_) => EXIT_ERROR,
    }
}

fn evaluation_exit_code(bundle: &EvaluationBundle) -> u8 {
    if bundle.is_compliant() {
        EXIT_OK
    } else {
        EXIT_FINDINGS
    }
}

fn check_exit_code(report: &LoadReport, issues: &[ConsistencyIssue]) -> u8 {
    if report.is_clean() && issues.is_empty() {
        EXIT_OK
    } else {
        EXIT_FINDINGS
    }
}

fn run_interpret(args: &InterpretArgs, config: &EngineConfig) -> Result<u8> {
    let text = match (&args.text, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            return Err(ComplianceError::Config(
                "either --text or --file is required".to_string(),
            ))
        }
    };

    let context = args
        .effective_date
        .as_ref()
        .map(|date| json!({ "effective_date": date }));

    let interpreter = Interpreter::with_config(config);
    let interpretation = interpreter.interpret(&text, &args.regulator, context.as_ref());

    print_json(interpretation.as_ref())?;
    Ok(EXIT_OK)
}

fn run_diff(args: &DiffArgs, config: &EngineConfig) -> Result<u8> {
    let old_text = std::fs::read_to_string(&args.old)?;
    let new_text = std::fs::read_to_string(&args.new)?;

    let interpreter = Interpreter::with_config(config);
    let report = interpreter.analyze_regulatory_change(&old_text, &new_text, &args.regulator);

    print_json(&report)?;
    Ok(EXIT_OK)
}

fn run_evaluate(args: &EvaluateArgs, config: &EngineConfig) -> Result<u8> {
    let store = Arc::new(RuleStore::new());
    let report = store.load_from_path(rules_path(args.rules.as_deref(), config)?)?;
    if !report.is_clean() {
        info!(rejected = report.rejected.len(), "Some rule records were skipped");
    }

    let data: DataRecord = serde_json::from_str(&std::fs::read_to_string(&args.data)?)?;

    let engine = RuleEngine::with_config(store, config);
    let bundle = match &args.as_of {
        Some(as_of) => {
            let as_of = parse_timestamp(as_of).ok_or_else(|| {
                ComplianceError::Config(format!("unparseable --as-of '{}'", as_of))
            })?;
            engine.evaluate_at(&data, &args.regulator, as_of)?
        }
        None => engine.evaluate(&data, &args.regulator)?,
    };

    let audit = AuditLog::new(config.audit_capacity);
    let audit_id = audit.record(&data, &bundle);

    print_json(&json!({
        "audit_id": audit_id,
        "summary": bundle.summary(),
        "bundle": bundle,
    }))?;

    Ok(evaluation_exit_code(&bundle))
}

fn run_check(args: &CheckArgs, config: &EngineConfig) -> Result<u8> {
    let store = RuleStore::new();
    let report = store.load_from_path(rules_path(args.rules.as_deref(), config)?)?;
    let issues = store.validate_consistency();

    let rejected: Vec<String> = report.rejected.iter().map(|e| e.to_string()).collect();

    print_json(&json!({
        "loaded": report.loaded,
        "regulators": report.regulators,
        "rejected": rejected,
        "issues": issues,
        "calculations": create_default_calculations().catalog(),
        "transformations": create_default_transformations().catalog(),
    }))?;

    Ok(check_exit_code(&report, &issues))
}

fn rules_path<'a>(explicit: Option<&'a Path>, config: &'a EngineConfig) -> Result<&'a Path> {
    explicit
        .or(config.rules_path.as_deref())
        .ok_or_else(|| {
            ComplianceError::Config("no rules file given (--rules or REGENGINE_RULES_PATH)".to_string())
        })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered: String = serde_json::to_string_pretty(value)?;
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(value: serde_json::Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", value).unwrap();
        file
    }

    fn positive_revenue(rule_id: &str) -> serde_json::Value {
        json!({
            "rule_id": rule_id,
            "regulator": "SEC",
            "rule_type": "validation",
            "description": "Revenue must be positive",
            "expression": "revenue > 0",
            "parameters": {"field": "revenue", "condition": "positive"},
            "version": "1.0",
            "effective_date": "2024-01-01"
        })
    }

    fn evaluate_args(rules: &NamedTempFile, data: &NamedTempFile) -> EvaluateArgs {
        EvaluateArgs {
            regulator: "SEC".to_string(),
            data: data.path().to_path_buf(),
            rules: Some(rules.path().to_path_buf()),
            as_of: None,
        }
    }

    #[test]
    fn test_log_directive_precedence() {
        assert_eq!(log_directive(0, Some("debug"), "info"), "debug");
        assert_eq!(log_directive(0, None, "info"), "info");
        assert_eq!(log_directive(0, Some("  "), "warn"), "warn");
        assert_eq!(log_directive(2, Some("error"), "info"), "debug");
        assert_eq!(log_directive(5, None, "info"), "trace");
    }

    #[test]
    fn test_evaluate_exit_codes() {
        let config = EngineConfig::default();
        let rules = json_file(json!([positive_revenue("SEC-V-001")]));

        let negative = json_file(json!({"revenue": -1000}));
        let result = run_evaluate(&evaluate_args(&rules, &negative), &config);
        assert_eq!(exit_code(&result), EXIT_FINDINGS);

        let positive = json_file(json!({"revenue": 500}));
        let result = run_evaluate(&evaluate_args(&rules, &positive), &config);
        assert_eq!(exit_code(&result), EXIT_OK);
    }

    #[test]
    fn test_check_exit_codes() {
        let config = EngineConfig::default();

        let duplicated = json_file(json!([
            positive_revenue("SEC-V-001"),
            positive_revenue("SEC-V-001")
        ]));
        let args = CheckArgs {
            rules: Some(duplicated.path().to_path_buf()),
        };
        assert_eq!(exit_code(&run_check(&args, &config)), EXIT_FINDINGS);

        let mut rejected = positive_revenue("SEC-V-002");
        rejected["rule_type"] = json!("scoring");
        let with_reject = json_file(json!([positive_revenue("SEC-V-001"), rejected]));
        let args = CheckArgs {
            rules: Some(with_reject.path().to_path_buf()),
        };
        assert_eq!(exit_code(&run_check(&args, &config)), EXIT_FINDINGS);

        let clean = json_file(json!([positive_revenue("SEC-V-001")]));
        let args = CheckArgs {
            rules: Some(clean.path().to_path_buf()),
        };
        assert_eq!(exit_code(&run_check(&args, &config)), EXIT_OK);
    }

    #[test]
    fn test_errors_exit_with_one() {
        let config = EngineConfig::default();
        let dir = tempfile::tempdir().unwrap();

        let missing = CheckArgs {
            rules: Some(dir.path().join("absent.json")),
        };
        assert_eq!(exit_code(&run_check(&missing, &config)), EXIT_ERROR);

        let no_rules = CheckArgs { rules: None };
        assert_eq!(exit_code(&run_check(&no_rules, &config)), EXIT_ERROR);

        let rules = json_file(json!([positive_revenue("SEC-V-001")]));
        let data = json_file(json!({"revenue": 1}));
        let mut args = evaluate_args(&rules, &data);
        args.regulator = "ESMA".to_string();
        assert_eq!(exit_code(&run_evaluate(&args, &config)), EXIT_ERROR);
    }

    #[test]
    fn test_check_exit_code_from_report() {
        let report = LoadReport::default();
        assert_eq!(check_exit_code(&report, &[]), EXIT_OK);

        let issue = ConsistencyIssue {
            issue_type: regulatory_rule_engine::rules::IssueType::DuplicateRuleId,
            regulator: "SEC".to_string(),
            rule_ids: vec!["SEC-V-001".to_string()],
            message: "Duplicate rule IDs found".to_string(),
        };
        assert_eq!(check_exit_code(&report, &[issue]), EXIT_FINDINGS);
    }
}
