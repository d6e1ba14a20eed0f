//! Pattern library
//!
//! Static extraction patterns per category and the per-regulator
//! domain-knowledge table. Pure data: compiled once, never mutated.

use lazy_static::lazy_static;
use regex::Regex;

const REQUIREMENT_SOURCES: &[&str] = &[
    r"shall\s+(?P<action>\w+)",
    r"must\s+(?P<action>\w+)",
    r"required\s+to\s+(?P<action>\w+)",
    r"obligated\s+to\s+(?P<action>\w+)",
];

const PROHIBITION_SOURCES: &[&str] = &[
    r"shall\s+not\s+(?P<action>\w+)",
    r"must\s+not\s+(?P<action>\w+)",
    r"prohibited\s+from\s+(?P<action>\w+)",
    r"may\s+not\s+(?P<action>\w+)",
];

const EXEMPTION_SOURCES: &[&str] = &[
    r"except\s+(?P<condition>.+)",
    r"unless\s+(?P<condition>.+)",
    r"exempted\s+if\s+(?P<condition>.+)",
    r"not\s+applicable\s+to\s+(?P<entity>.+)",
];

const CALCULATION_SOURCES: &[&str] = &[
    r"calculated\s+as\s+(?P<formula>.+)",
    r"determined\s+by\s+(?P<method>.+)",
    r"equals?\s+(?P<formula>.+)",
    r"(?P<metric>\w+)\s*=\s*(?P<formula>.+)",
];

const DATA_FIELD_SOURCES: &[&str] = &[
    r"report\s+(?P<field>\w+)",
    r"disclose\s+(?P<field>\w+)",
    r"provide\s+(?P<field>\w+)",
    r"submit\s+(?P<field>\w+)",
];

const DEADLINE_SOURCES: &[&str] = &[
    r"within\s+(?P<days>\d+)\s+days",
    r"by\s+(?P<date>[\w\s,]+)",
    r"no\s+later\s+than\s+(?P<date>[\w\s,]+)",
    r"(?P<frequency>monthly|quarterly|annually)",
];

/// Legal abbreviations expanded during normalization, applied in order
pub const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Corp.", "Corporation"),
    ("Inc.", "Incorporated"),
    ("Ltd.", "Limited"),
    ("Co.", "Company"),
];

/// Hedging words that lower interpretation confidence
pub const AMBIGUITY_MARKERS: &[&str] = &["may", "could", "might", "generally", "typically"];

fn compile(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|source| {
            Regex::new(&format!("(?i){}", source)).expect("static regulatory pattern must compile")
        })
        .collect()
}

lazy_static! {
    pub static ref REQUIREMENT_PATTERNS: Vec<Regex> = compile(REQUIREMENT_SOURCES);
    pub static ref PROHIBITION_PATTERNS: Vec<Regex> = compile(PROHIBITION_SOURCES);
    pub static ref EXEMPTION_PATTERNS: Vec<Regex> = compile(EXEMPTION_SOURCES);
    pub static ref CALCULATION_PATTERNS: Vec<Regex> = compile(CALCULATION_SOURCES);
    pub static ref DATA_FIELD_PATTERNS: Vec<Regex> = compile(DATA_FIELD_SOURCES);
    pub static ref DEADLINE_PATTERNS: Vec<Regex> = compile(DEADLINE_SOURCES);

    pub static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static pattern must compile");
    pub static ref SECTION_SIGN: Regex = Regex::new(r"§\s*(\d+)").expect("static pattern must compile");
    pub static ref SECTION_REFERENCE: Regex =
        Regex::new(r"(?i)\bsection\s+(?P<section>\d+(?:\.\d+)*(?:\([a-z0-9]+\))*)")
            .expect("static pattern must compile");
}

/// True when any pattern in the set matches somewhere in `text`
pub fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|pattern| pattern.is_match(text))
}

/// All captures of `group` across every pattern, in pattern order then
/// position order. Patterns without that group contribute nothing.
pub fn capture_all(patterns: &[Regex], group: &str, text: &str) -> Vec<String> {
    let mut found = Vec::new();

    for pattern in patterns {
        for caps in pattern.captures_iter(text) {
            if let Some(m) = caps.name(group) {
                found.push(m.as_str().trim().to_string());
            }
        }
    }

    found
}

//
// ================= Domain Knowledge =================
//

#[derive(Debug, Clone, Copy)]
pub struct Threshold {
    pub name: &'static str,
    pub metric: &'static str,
    pub value: u64,
}

/// What the engine knows about one regulator
#[derive(Debug)]
pub struct DomainKnowledge {
    pub regulator: &'static str,
    pub forms: &'static [&'static str],
    pub concepts: &'static [&'static str],
    /// Known formula name → canonical definition
    pub calculations: &'static [(&'static str, &'static str)],
    pub thresholds: &'static [Threshold],
}

static DOMAIN_KNOWLEDGE: &[DomainKnowledge] = &[
    DomainKnowledge {
        regulator: "sec",
        forms: &["10-K", "10-Q", "8-K", "DEF 14A"],
        concepts: &["material", "non-GAAP", "beneficial ownership"],
        calculations: &[
            ("eps", "net_income / weighted_average_shares"),
            ("current_ratio", "current_assets / current_liabilities"),
        ],
        thresholds: &[],
    },
    DomainKnowledge {
        regulator: "fca",
        forms: &["GABRIEL", "REP-CRIM", "FSA001"],
        concepts: &["conduct risk", "operational resilience"],
        calculations: &[],
        thresholds: &[Threshold {
            name: "large_firm",
            metric: "assets",
            value: 15_000_000_000,
        }],
    },
    DomainKnowledge {
        regulator: "esma",
        forms: &["EMIR", "MiFID II", "AIFMD"],
        concepts: &["systematic internaliser", "dark pool"],
        calculations: &[("leverage", "exposure / nav")],
        thresholds: &[],
    },
];

/// Look up a regulator's domain entry (case-insensitive)
pub fn domain_knowledge(regulator: &str) -> Option<&'static DomainKnowledge> {
    let key = regulator.trim().to_lowercase();
    DOMAIN_KNOWLEDGE.iter().find(|entry| entry.regulator == key)
}
