//! Import guardrails from an existing linter configuration.
//!
//! Only `.eslintrc.json` is understood. Known rules map to fixed guardrail
//! texts; rules outside the table are ignored.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::plugins::guardrails::{self, GuardrailCategory, GuardrailSource, NewGuardrail, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// ESLint rule name, guardrail category, guardrail text.
pub const ESLINT_RULE_MAP: &[(&str, GuardrailCategory, &str)] = &[
    (
        "camelcase",
        GuardrailCategory::Naming,
        "Variables and functions use camelCase naming",
    ),
    ("no-eval", GuardrailCategory::Security, "Never call `eval`"),
    (
        "no-implied-eval",
        GuardrailCategory::Security,
        "Never pass code strings to `setTimeout` or `setInterval`",
    ),
    (
        "no-console",
        GuardrailCategory::Design,
        "Do not leave `console.log` calls in committed code",
    ),
    (
        "eqeqeq",
        GuardrailCategory::Design,
        "Compare with `===` and `!==`, not loose equality",
    ),
    (
        "no-var",
        GuardrailCategory::Design,
        "Declare bindings with let or const, never `var `",
    ),
    (
        "prefer-const",
        GuardrailCategory::Design,
        "Use `const` for bindings that are never reassigned",
    ),
    (
        "max-depth",
        GuardrailCategory::Design,
        "Keep block nesting shallow",
    ),
];

#[derive(Debug, Deserialize)]
struct EslintConfig {
    #[serde(default)]
    rules: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: Vec<i64>,
    pub duplicates: usize,
    pub disabled: Vec<String>,
    pub unknown: Vec<String>,
}

/// ESLint severity to guardrail severity. `None` means the rule is off.
fn eslint_severity(value: &Value) -> Result<Option<Severity>, error::AimemError> {
    let level = match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    match level.unwrap_or(&Value::Null) {
        Value::String(s) => match s.as_str() {
            "error" => Ok(Some(Severity::Block)),
            "warn" => Ok(Some(Severity::Warn)),
            "off" => Ok(None),
            other => Err(error::AimemError::ValidationError(format!(
                "unknown ESLint level '{}'",
                other
            ))),
        },
        Value::Number(n) => match n.as_i64() {
            Some(2) => Ok(Some(Severity::Block)),
            Some(1) => Ok(Some(Severity::Warn)),
            Some(0) => Ok(None),
            _ => Err(error::AimemError::ValidationError(format!(
                "unknown ESLint level {}",
                n
            ))),
        },
        other => Err(error::AimemError::ValidationError(format!(
            "unsupported ESLint rule setting {}",
            other
        ))),
    }
}

/// `max-depth` carries its limit either as a bare number or as `{ "max": n }`.
fn max_depth_limit(value: &Value) -> Option<u64> {
    let option = value.as_array()?.get(1)?;
    option
        .as_u64()
        .or_else(|| option.get("max").and_then(Value::as_u64))
}

/// Guardrails described by an ESLint config, plus the names of rules that
/// were switched off and rules with no mapping.
pub fn parse_eslint_rules(
    json: &str,
) -> Result<(Vec<NewGuardrail>, Vec<String>, Vec<String>), error::AimemError> {
    let config: EslintConfig = serde_json::from_str(json)?;
    let mut rules = Vec::new();
    let mut disabled = Vec::new();
    let mut unknown = Vec::new();

    for (name, setting) in &config.rules {
        let Some((_, category, text)) = ESLINT_RULE_MAP.iter().find(|(n, _, _)| *n == name.as_str()) else {
            unknown.push(name.clone());
            continue;
        };
        let Some(severity) = eslint_severity(setting)? else {
            disabled.push(name.clone());
            continue;
        };
        let rule = match (name.as_str(), max_depth_limit(setting)) {
            ("max-depth", Some(limit)) => format!("Keep block nesting at most {} levels deep", limit),
            _ => text.to_string(),
        };
        rules.push(NewGuardrail {
            category: *category,
            rule,
            rationale: Some(format!("Enforced by ESLint rule '{}'", name)),
            severity,
            source: GuardrailSource::Imported,
        });
    }
    Ok((rules, disabled, unknown))
}

pub fn import_eslint_config(
    store: &Store,
    project_id: i64,
    path: &Path,
) -> Result<ImportReport, error::AimemError> {
    let content = fs::read_to_string(path)?;
    let (rules, disabled, unknown) = parse_eslint_rules(&content)?;

    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "operator", None, "importer.eslint", |conn| {
        let tx = conn.unchecked_transaction()?;
        let mut report = ImportReport {
            disabled,
            unknown,
            ..ImportReport::default()
        };
        for rule in &rules {
            if guardrails::rule_exists(&tx, project_id, &rule.rule)? {
                report.duplicates += 1;
                continue;
            }
            report.imported.push(guardrails::insert_guardrail(&tx, project_id, rule)?);
        }
        tx.commit()?;
        Ok(report)
    })
}
