//! Pattern analyzer: proposes guardrails from codebase statistics.
//!
//! Input is the list of structures the indexer recorded for a project. Each
//! requested category runs its own sub-analyzer; `design` and `performance`
//! have none and always propose nothing. Output order is stable for a given
//! input so repeated runs propose the same rules.

use crate::core::broker::DbBroker;
use crate::core::config::{self, Thresholds};
use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::plugins::dik::{self, DikCounter};
use crate::plugins::guardrails::{self, GuardrailCategory, GuardrailSource, NewGuardrail, Severity};
use crate::plugins::matcher::{KeywordSet, TextClassifier};
use crate::plugins::projects::{self, CodeStructure};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedRule {
    pub category: GuardrailCategory,
    pub rule: String,
    pub rationale: String,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

pub const AUTH_TERMS: &[&str] = &["auth", "middleware", "authenticate", "authorize"];
pub const VALIDATION_TERMS: &[&str] = &["validate", "validation", "sanitize", "sanitise", "escape"];

/// Verb prefixes worth a naming rule, with the kind of function they name.
pub const VERB_PREFIXES: &[(&str, &str)] = &[
    ("get", "accessor"),
    ("set", "mutator"),
    ("is", "boolean check"),
    ("has", "boolean check"),
    ("can", "permission check"),
    ("should", "decision predicate"),
    ("create", "constructor"),
    ("delete", "removal"),
    ("update", "modification"),
    ("fetch", "remote read"),
    ("load", "loader"),
    ("save", "persistence"),
    ("find", "lookup"),
    ("handle", "event handler"),
    ("on", "event callback"),
    ("use", "hook"),
];

const FUNCTION_KINDS: &[&str] = &["function", "method"];
const CLASS_KINDS: &[&str] = &["class", "struct"];

/// Run the sub-analyzers for `categories` over `structures`.
pub fn analyze_structures(
    structures: &[CodeStructure],
    categories: &[GuardrailCategory],
    thresholds: &Thresholds,
) -> Vec<ProposedRule> {
    if structures.is_empty() {
        return Vec::new();
    }
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for category in categories {
        if seen.contains(category) {
            continue;
        }
        seen.push(*category);
        match category {
            GuardrailCategory::Architecture => out.extend(analyze_architecture(structures, thresholds)),
            GuardrailCategory::Naming => out.extend(analyze_naming(structures, thresholds)),
            GuardrailCategory::Testing => out.extend(analyze_testing(structures, thresholds)),
            GuardrailCategory::Security => out.extend(analyze_security(structures, thresholds)),
            GuardrailCategory::Design | GuardrailCategory::Performance => {}
        }
    }
    out
}

/// Analyze the structures recorded for a project, using the store's
/// configured thresholds.
pub fn analyze_project(
    store: &Store,
    project_id: i64,
    categories: &[GuardrailCategory],
) -> Result<Vec<ProposedRule>, error::AimemError> {
    let config = config::load_config(&store.root)?;
    let structures = projects::list_structures(store, project_id)?;
    Ok(analyze_structures(&structures, categories, &config.thresholds))
}

/// Persist proposals as inferred, warn-level guardrails.
///
/// A proposal whose rule text the project already has (active or not) is
/// skipped. `rules_inferred` grows by one per guardrail actually saved.
/// Returns the ids of the saved guardrails.
pub fn save_proposed_rules(
    store: &Store,
    project_id: i64,
    rules: &[ProposedRule],
) -> Result<Vec<i64>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);

    broker.with_conn(&db_path, "aimem", None, "analyzer.save", |conn| {
        let tx = conn.unchecked_transaction()?;
        let mut saved = Vec::new();
        for proposal in rules {
            if guardrails::rule_exists(&tx, project_id, &proposal.rule)? {
                continue;
            }
            let id = guardrails::insert_guardrail(
                &tx,
                project_id,
                &NewGuardrail {
                    category: proposal.category,
                    rule: proposal.rule.clone(),
                    rationale: Some(proposal.rationale.clone()),
                    severity: Severity::Warn,
                    source: GuardrailSource::Inferred,
                },
            )?;
            dik::bump_counter(&tx, project_id, DikCounter::RulesInferred, 1)?;
            saved.push(id);
        }
        tx.commit()?;
        Ok(saved)
    })
}

fn push_unique(evidence: &mut Vec<String>, path: &str, max: usize) {
    if evidence.len() < max && !evidence.iter().any(|p| p == path) {
        evidence.push(path.to_string());
    }
}

/// Pick the entry with the highest count; earlier keys win ties.
fn dominant<K: Copy>(counts: &[(K, usize)]) -> Option<(K, usize)> {
    let mut best: Option<(K, usize)> = None;
    for &(key, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best
}

// ============================================================================
// ARCHITECTURE
// ============================================================================

/// The full parent directory of `file_path` and its last component. Files at
/// the root have no directory and are left out.
fn parent_dir(file_path: &str) -> Option<(String, String)> {
    let parent = Path::new(file_path).parent()?;
    let name = parent.file_name()?.to_string_lossy().to_string();
    Some((parent.to_string_lossy().replace('\\', "/"), name))
}

fn analyze_architecture(structures: &[CodeStructure], t: &Thresholds) -> Vec<ProposedRule> {
    // Keyed by full path so `src/a/utils` and `lib/utils` stay apart.
    let mut by_dir: BTreeMap<String, (String, Vec<&CodeStructure>)> = BTreeMap::new();
    for s in structures {
        if let Some((path, name)) = parent_dir(&s.file_path) {
            by_dir.entry(path).or_insert_with(|| (name, Vec::new())).1.push(s);
        }
    }

    let mut out = Vec::new();
    for (dir, members) in by_dir.values() {
        let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
        for s in members {
            *kinds.entry(s.kind.as_str()).or_default() += 1;
        }
        let counts: Vec<(&str, usize)> = kinds.into_iter().collect();
        let Some((kind, count)) = dominant(&counts) else {
            continue;
        };
        let ratio = count as f64 / members.len() as f64;
        if ratio <= t.architecture_dominance || count < t.architecture_min_count {
            continue;
        }
        let mut evidence = Vec::new();
        for s in members.iter().filter(|s| s.kind == kind) {
            push_unique(&mut evidence, &s.file_path, t.architecture_max_evidence);
        }
        out.push(ProposedRule {
            category: GuardrailCategory::Architecture,
            rule: format!("Place {} definitions in `{}/`", kind, dir),
            rationale: format!(
                "{} of {} structures in {}/ are {} definitions",
                count,
                members.len(),
                dir,
                kind
            ),
            confidence: ratio,
            evidence,
        });
    }
    out
}

// ============================================================================
// NAMING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamingStyle {
    CamelCase,
    SnakeCase,
    PascalCase,
    KebabCase,
}

impl NamingStyle {
    pub const ALL: [NamingStyle; 4] = [
        NamingStyle::CamelCase,
        NamingStyle::SnakeCase,
        NamingStyle::PascalCase,
        NamingStyle::KebabCase,
    ];

    /// The literal token rules use to name the style.
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingStyle::CamelCase => "camelCase",
            NamingStyle::SnakeCase => "snake_case",
            NamingStyle::PascalCase => "PascalCase",
            NamingStyle::KebabCase => "kebab-case",
        }
    }
}

fn naming_regexes() -> &'static [(NamingStyle, Regex)] {
    static RES: OnceLock<Vec<(NamingStyle, Regex)>> = OnceLock::new();
    RES.get_or_init(|| {
        vec![
            (
                NamingStyle::CamelCase,
                Regex::new(r"^[a-z][a-z0-9]*[A-Z][a-zA-Z0-9]*$").expect("static regex"),
            ),
            (
                NamingStyle::SnakeCase,
                Regex::new(r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)+$").expect("static regex"),
            ),
            (
                NamingStyle::PascalCase,
                Regex::new(r"^[A-Z][a-zA-Z0-9]*$").expect("static regex"),
            ),
            (
                NamingStyle::KebabCase,
                Regex::new(r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)+$").expect("static regex"),
            ),
        ]
    })
}

/// Classify an identifier. Single lowercase words (`run`, `new`) carry no
/// style signal and return `None`.
pub fn classify_name(name: &str) -> Option<NamingStyle> {
    naming_regexes()
        .iter()
        .find(|(_, re)| re.is_match(name))
        .map(|(style, _)| *style)
}

/// The verb prefix `name` starts with, if the character after it is an
/// uppercase letter or `_`.
pub fn verb_prefix(name: &str) -> Option<&'static str> {
    VERB_PREFIXES.iter().map(|(p, _)| *p).find(|p| {
        name.strip_prefix(*p)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_uppercase() || c == '_')
    })
}

fn style_rule(
    members: &[&CodeStructure],
    min_items: usize,
    share_cutoff: f64,
    max_evidence: usize,
    subject: &str,
) -> Option<ProposedRule> {
    if members.len() < min_items {
        return None;
    }
    // Unclassifiable names still count toward the total.
    let classified: Vec<(NamingStyle, &CodeStructure)> = members
        .iter()
        .filter_map(|s| classify_name(&s.name).map(|style| (style, *s)))
        .collect();
    let counts: Vec<(NamingStyle, usize)> = NamingStyle::ALL
        .iter()
        .map(|style| (*style, classified.iter().filter(|(s, _)| s == style).count()))
        .collect();
    let (style, count) = dominant(&counts)?;
    let share = count as f64 / members.len() as f64;
    if share <= share_cutoff {
        return None;
    }
    let mut evidence = Vec::new();
    for (_, s) in classified.iter().filter(|(s, _)| *s == style) {
        push_unique(&mut evidence, &s.file_path, max_evidence);
    }
    Some(ProposedRule {
        category: GuardrailCategory::Naming,
        rule: format!("{} use {} naming", subject, style.as_str()),
        rationale: format!(
            "{} of {} named {} follow {}",
            count,
            members.len(),
            subject.to_lowercase(),
            style.as_str()
        ),
        confidence: share,
        evidence,
    })
}

fn analyze_naming(structures: &[CodeStructure], t: &Thresholds) -> Vec<ProposedRule> {
    let functions: Vec<&CodeStructure> = structures
        .iter()
        .filter(|s| FUNCTION_KINDS.contains(&s.kind.as_str()))
        .collect();
    let classes: Vec<&CodeStructure> = structures
        .iter()
        .filter(|s| CLASS_KINDS.contains(&s.kind.as_str()))
        .collect();

    let mut out = Vec::new();
    if let Some(rule) = style_rule(
        &functions,
        t.naming_function_min_items,
        t.naming_function_share,
        t.architecture_max_evidence,
        "Functions and methods",
    ) {
        out.push(rule);
    }
    if let Some(rule) = style_rule(
        &classes,
        t.naming_class_min_items,
        t.naming_class_share,
        t.architecture_max_evidence,
        "Classes and structs",
    ) {
        out.push(rule);
    }

    for (prefix, purpose) in VERB_PREFIXES {
        let users: Vec<&&CodeStructure> = functions
            .iter()
            .filter(|s| verb_prefix(&s.name) == Some(*prefix))
            .collect();
        if users.len() < t.verb_prefix_min_uses {
            continue;
        }
        let mut evidence = Vec::new();
        for s in &users {
            push_unique(&mut evidence, &s.file_path, t.architecture_max_evidence);
        }
        out.push(ProposedRule {
            category: GuardrailCategory::Naming,
            rule: format!("Start {} function names with the {} prefix", purpose, prefix),
            rationale: format!("{} functions already use the {} prefix", users.len(), prefix),
            confidence: t.verb_prefix_confidence,
            evidence,
        });
    }
    out
}

// ============================================================================
// TESTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestLayout {
    DunderTests,
    TestDir,
    TestsDir,
    Colocated,
}

impl TestLayout {
    const ALL: [TestLayout; 4] = [
        TestLayout::DunderTests,
        TestLayout::TestDir,
        TestLayout::TestsDir,
        TestLayout::Colocated,
    ];

    fn rule(&self) -> &'static str {
        match self {
            TestLayout::DunderTests => "Place tests in `__tests__/` directories next to the code they cover",
            TestLayout::TestDir => "Place tests under a `test/` directory",
            TestLayout::TestsDir => "Place tests under a `tests/` directory",
            TestLayout::Colocated => "Colocate tests with their source as `*.test.*` or `*.spec.*` files",
        }
    }
}

pub fn classify_test_path(path: &str) -> Option<TestLayout> {
    let p = path.to_lowercase().replace('\\', "/");
    if p.contains("__tests__/") {
        Some(TestLayout::DunderTests)
    } else if p.starts_with("tests/") || p.contains("/tests/") {
        Some(TestLayout::TestsDir)
    } else if p.starts_with("test/") || p.contains("/test/") {
        Some(TestLayout::TestDir)
    } else if p.contains(".test.") || p.contains(".spec.") {
        Some(TestLayout::Colocated)
    } else {
        None
    }
}

fn analyze_testing(structures: &[CodeStructure], t: &Thresholds) -> Vec<ProposedRule> {
    let mut test_files: Vec<&str> = Vec::new();
    for s in structures {
        let lower = s.file_path.to_lowercase();
        if (lower.contains("test") || lower.contains("spec"))
            && !test_files.contains(&s.file_path.as_str())
        {
            test_files.push(&s.file_path);
        }
    }
    if test_files.is_empty() {
        return Vec::new();
    }

    let classified: Vec<(TestLayout, &str)> = test_files
        .iter()
        .filter_map(|f| classify_test_path(f).map(|layout| (layout, *f)))
        .collect();
    let counts: Vec<(TestLayout, usize)> = TestLayout::ALL
        .iter()
        .map(|layout| (*layout, classified.iter().filter(|(l, _)| l == layout).count()))
        .collect();
    let Some((layout, count)) = dominant(&counts) else {
        return Vec::new();
    };
    if count < t.testing_min_count {
        return Vec::new();
    }
    let mut evidence = Vec::new();
    for (_, f) in classified.iter().filter(|(l, _)| *l == layout) {
        push_unique(&mut evidence, f, t.architecture_max_evidence);
    }
    vec![ProposedRule {
        category: GuardrailCategory::Testing,
        rule: layout.rule().to_string(),
        rationale: format!("{} of {} test files follow this layout", count, test_files.len()),
        confidence: count as f64 / test_files.len() as f64,
        evidence,
    }]
}

// ============================================================================
// SECURITY
// ============================================================================

fn scan_terms<'a>(structures: &'a [CodeStructure], classifier: &dyn TextClassifier) -> Vec<&'a CodeStructure> {
    structures
        .iter()
        .filter(|s| classifier.matches(&format!("{} {}", s.name, s.raw_text)))
        .collect()
}

fn analyze_security(structures: &[CodeStructure], t: &Thresholds) -> Vec<ProposedRule> {
    let mut out = Vec::new();

    let auth_hits = scan_terms(structures, &KeywordSet::new(AUTH_TERMS));
    if auth_hits.len() >= t.security_auth_min_matches {
        let mut evidence = Vec::new();
        for s in &auth_hits {
            push_unique(&mut evidence, &s.file_path, t.architecture_max_evidence);
        }
        out.push(ProposedRule {
            category: GuardrailCategory::Security,
            rule: "Route handlers must go through the auth middleware before touching user data"
                .to_string(),
            rationale: format!("{} structures reference authentication", auth_hits.len()),
            confidence: t.security_auth_confidence,
            evidence,
        });
    }

    let validation_hits = scan_terms(structures, &KeywordSet::new(VALIDATION_TERMS));
    if validation_hits.len() >= t.security_validation_min_matches {
        let mut evidence = Vec::new();
        for s in &validation_hits {
            push_unique(&mut evidence, &s.file_path, t.architecture_max_evidence);
        }
        out.push(ProposedRule {
            category: GuardrailCategory::Security,
            rule: "Sanitize and validate external input before it reaches business logic"
                .to_string(),
            rationale: format!(
                "{} structures validate or sanitize input",
                validation_hits.len()
            ),
            confidence: t.security_validation_confidence,
            evidence,
        });
    }
    out
}
