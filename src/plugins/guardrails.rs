//! Guardrails: persisted project conventions and their enforcement.
//!
//! Checking an action matches it against every active guardrail of the
//! project, appends a `triggered` event per match and renders pushback text
//! at the project's current trust level. Accepting, overriding and
//! vindicating are recorded as further events and move the trust counters.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::output;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::analyzer::NamingStyle;
use crate::plugins::dik::{self, DikCounter};
use crate::plugins::matcher::{KeywordSet, TextClassifier, backtick_spans, quoted_spans};
use crate::plugins::responder;
use crate::plugins::vindication::{self, CandidateResolution, VindicationCandidate};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

/// Longest action text stored on a `triggered` event.
pub const TRIGGER_ACTION_MAX_CHARS: usize = 500;

pub const AUTH_EXTRA_KEYWORDS: &[&str] = &["password", "token", "secret", "credential"];
pub const SANITIZE_EXTRA_KEYWORDS: &[&str] = &["sanitize", "escape", "validate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardrailCategory {
    Design,
    Architecture,
    Naming,
    Security,
    Performance,
    Testing,
}

impl GuardrailCategory {
    pub const ALL: [GuardrailCategory; 6] = [
        GuardrailCategory::Design,
        GuardrailCategory::Architecture,
        GuardrailCategory::Naming,
        GuardrailCategory::Security,
        GuardrailCategory::Performance,
        GuardrailCategory::Testing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GuardrailCategory::Design => "design",
            GuardrailCategory::Architecture => "architecture",
            GuardrailCategory::Naming => "naming",
            GuardrailCategory::Security => "security",
            GuardrailCategory::Performance => "performance",
            GuardrailCategory::Testing => "testing",
        }
    }
}

impl FromStr for GuardrailCategory {
    type Err = error::AimemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GuardrailCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| error::AimemError::ValidationError(format!("unknown category '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Block,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Block => "block",
        }
    }
}

impl FromStr for Severity {
    type Err = error::AimemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warn" => Ok(Severity::Warn),
            "block" => Ok(Severity::Block),
            other => Err(error::AimemError::ValidationError(format!(
                "unknown severity '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardrailSource {
    Inferred,
    Explicit,
    Imported,
}

impl GuardrailSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardrailSource::Inferred => "inferred",
            GuardrailSource::Explicit => "explicit",
            GuardrailSource::Imported => "imported",
        }
    }
}

impl FromStr for GuardrailSource {
    type Err = error::AimemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inferred" => Ok(GuardrailSource::Inferred),
            "explicit" => Ok(GuardrailSource::Explicit),
            "imported" => Ok(GuardrailSource::Imported),
            other => Err(error::AimemError::ValidationError(format!(
                "unknown guardrail source '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Triggered,
    Overridden,
    Accepted,
    Vindicated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Triggered => "triggered",
            EventType::Overridden => "overridden",
            EventType::Accepted => "accepted",
            EventType::Vindicated => "vindicated",
        }
    }
}

impl FromStr for EventType {
    type Err = error::AimemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "triggered" => Ok(EventType::Triggered),
            "overridden" => Ok(EventType::Overridden),
            "accepted" => Ok(EventType::Accepted),
            "vindicated" => Ok(EventType::Vindicated),
            other => Err(error::AimemError::ValidationError(format!(
                "unknown event type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Guardrail {
    pub id: i64,
    pub project_id: i64,
    pub category: GuardrailCategory,
    pub rule: String,
    pub rationale: Option<String>,
    pub severity: Severity,
    pub source: GuardrailSource,
    pub confirmed: bool,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewGuardrail {
    pub category: GuardrailCategory,
    pub rule: String,
    pub rationale: Option<String>,
    pub severity: Severity,
    pub source: GuardrailSource,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GuardrailEvent {
    pub id: i64,
    pub guardrail_id: i64,
    pub event_type: EventType,
    pub context: Option<String>,
    pub response: Option<String>,
    pub dik_level: f64,
    /// For `vindicated` events: the override being resolved.
    pub ref_event_id: Option<i64>,
    /// Raw JSON vindication candidate, present on some `overridden` events.
    pub metadata: Option<String>,
    pub created_at: String,
}

impl GuardrailEvent {
    pub fn candidate(&self) -> Option<VindicationCandidate> {
        self.metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardrailHistory {
    pub previous_override_count: i64,
    pub ever_vindicated: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Violation {
    pub guardrail_id: i64,
    pub category: GuardrailCategory,
    pub rule: String,
    pub rationale: Option<String>,
    pub severity: Severity,
    pub matched_keywords: Vec<String>,
    pub history: GuardrailHistory,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CheckResult {
    pub violations: Vec<Violation>,
    pub dik_level: f64,
    pub response: String,
}

// ============================================================================
// ROW HELPERS
// ============================================================================

const GUARDRAIL_COLUMNS: &str =
    "id, project_id, category, rule, rationale, severity, source, confirmed, active, created_at";
const EVENT_COLUMNS: &str =
    "id, guardrail_id, event_type, context, response, dik_level, ref_event_id, metadata, created_at";

fn text_err(idx: usize, err: error::AimemError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn row_to_guardrail(row: &rusqlite::Row) -> Result<Guardrail, rusqlite::Error> {
    let category: String = row.get(2)?;
    let severity: String = row.get(5)?;
    let source: String = row.get(6)?;
    Ok(Guardrail {
        id: row.get(0)?,
        project_id: row.get(1)?,
        category: category.parse().map_err(|e| text_err(2, e))?,
        rule: row.get(3)?,
        rationale: row.get(4)?,
        severity: severity.parse().map_err(|e| text_err(5, e))?,
        source: source.parse().map_err(|e| text_err(6, e))?,
        confirmed: row.get::<_, i64>(7)? != 0,
        active: row.get::<_, i64>(8)? != 0,
        created_at: row.get(9)?,
    })
}

pub(crate) fn row_to_event(row: &rusqlite::Row) -> Result<GuardrailEvent, rusqlite::Error> {
    let event_type: String = row.get(2)?;
    Ok(GuardrailEvent {
        id: row.get(0)?,
        guardrail_id: row.get(1)?,
        event_type: event_type.parse().map_err(|e| text_err(2, e))?,
        context: row.get(3)?,
        response: row.get(4)?,
        dik_level: row.get(5)?,
        ref_event_id: row.get(6)?,
        metadata: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) struct NewEvent<'a> {
    pub guardrail_id: i64,
    pub event_type: EventType,
    pub context: Option<&'a str>,
    pub response: Option<&'a str>,
    pub dik_level: f64,
    pub ref_event_id: Option<i64>,
}

pub(crate) fn insert_event(conn: &Connection, ev: &NewEvent) -> Result<i64, error::AimemError> {
    conn.execute(
        "INSERT INTO guardrail_events(guardrail_id, event_type, context, response, dik_level, ref_event_id, metadata, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7)",
        params![
            ev.guardrail_id,
            ev.event_type.as_str(),
            ev.context,
            ev.response,
            ev.dik_level,
            ev.ref_event_id,
            time::now_epoch_z()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn insert_guardrail(
    conn: &Connection,
    project_id: i64,
    g: &NewGuardrail,
) -> Result<i64, error::AimemError> {
    if g.rule.trim().is_empty() {
        return Err(error::AimemError::ValidationError(
            "guardrail rule text must not be empty".to_string(),
        ));
    }
    conn.execute(
        "INSERT INTO guardrails(project_id, category, rule, rationale, severity, source, confirmed, active, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, 0, 1, ?7)",
        params![
            project_id,
            g.category.as_str(),
            g.rule.trim(),
            g.rationale,
            g.severity.as_str(),
            g.source.as_str(),
            time::now_epoch_z()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn rule_exists(conn: &Connection, project_id: i64, rule: &str) -> Result<bool, error::AimemError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM guardrails WHERE project_id = ?1 AND rule = ?2",
        params![project_id, rule.trim()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn load_guardrail(conn: &Connection, id: i64) -> Result<Option<Guardrail>, error::AimemError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM guardrails WHERE id = ?1", GUARDRAIL_COLUMNS),
            params![id],
            row_to_guardrail,
        )
        .optional()?)
}

fn load_project_guardrail(
    conn: &Connection,
    id: i64,
    project_id: i64,
) -> Result<Guardrail, error::AimemError> {
    match load_guardrail(conn, id)? {
        Some(g) if g.project_id == project_id => Ok(g),
        _ => Err(error::AimemError::NotFound(format!(
            "guardrail {} in project {}",
            id, project_id
        ))),
    }
}

fn history_in(conn: &Connection, guardrail_id: i64) -> Result<GuardrailHistory, error::AimemError> {
    let overrides: i64 = conn.query_row(
        "SELECT COUNT(*) FROM guardrail_events WHERE guardrail_id = ?1 AND event_type = 'overridden'",
        params![guardrail_id],
        |row| row.get(0),
    )?;
    let vindicated: i64 = conn.query_row(
        "SELECT COUNT(*) FROM guardrail_events WHERE guardrail_id = ?1 AND event_type = 'vindicated'",
        params![guardrail_id],
        |row| row.get(0),
    )?;
    Ok(GuardrailHistory {
        previous_override_count: overrides,
        ever_vindicated: vindicated > 0,
    })
}

fn current_level(conn: &Connection, project_id: i64) -> Result<f64, error::AimemError> {
    Ok(dik::calculate_dik(&dik::load_dik(conn, project_id)?))
}

// ============================================================================
// CRUD
// ============================================================================

pub fn add_guardrail(store: &Store, project_id: i64, input: NewGuardrail) -> Result<i64, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "operator", None, "guardrail.add", |conn| {
        insert_guardrail(conn, project_id, &input)
    })
}

pub fn get_guardrail(store: &Store, id: i64) -> Result<Option<Guardrail>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "guardrail.get", |conn| load_guardrail(conn, id))
}

/// Guardrails of a project ordered by id, optionally narrowed to one
/// category. Deactivated guardrails are included only on request.
pub fn list_guardrails(
    store: &Store,
    project_id: i64,
    category: Option<GuardrailCategory>,
    include_inactive: bool,
) -> Result<Vec<Guardrail>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "guardrail.list", |conn| {
        list_guardrails_in(conn, project_id, category, include_inactive)
    })
}

fn list_guardrails_in(
    conn: &Connection,
    project_id: i64,
    category: Option<GuardrailCategory>,
    include_inactive: bool,
) -> Result<Vec<Guardrail>, error::AimemError> {
    let sql = format!(
        "SELECT {} FROM guardrails
         WHERE project_id = ?1 AND (?2 IS NULL OR category = ?2) AND (?3 = 1 OR active = 1)
         ORDER BY id",
        GUARDRAIL_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![project_id, category.map(|c| c.as_str()), include_inactive as i64],
        row_to_guardrail,
    )?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Mark a guardrail confirmed. Returns `true` the first time; confirming
/// again is a no-op and does not count twice toward `rules_confirmed`.
pub fn confirm_guardrail(store: &Store, id: i64, project_id: i64) -> Result<bool, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "operator", None, "guardrail.confirm", |conn| {
        let tx = conn.unchecked_transaction()?;
        load_project_guardrail(&tx, id, project_id)?;
        let changed = tx.execute(
            "UPDATE guardrails SET confirmed = 1 WHERE id = ?1 AND confirmed = 0",
            params![id],
        )?;
        if changed > 0 {
            dik::bump_counter(&tx, project_id, DikCounter::RulesConfirmed, 1)?;
        }
        tx.commit()?;
        Ok(changed > 0)
    })
}

/// Soft-delete: the guardrail stops matching but keeps its history.
pub fn deactivate_guardrail(store: &Store, id: i64, project_id: i64) -> Result<bool, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "operator", None, "guardrail.deactivate", |conn| {
        load_project_guardrail(conn, id, project_id)?;
        let changed = conn.execute(
            "UPDATE guardrails SET active = 0 WHERE id = ?1 AND active = 1",
            params![id],
        )?;
        Ok(changed > 0)
    })
}

pub fn list_events(store: &Store, guardrail_id: i64) -> Result<Vec<GuardrailEvent>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "guardrail.events", |conn| {
        let sql = format!(
            "SELECT {} FROM guardrail_events WHERE guardrail_id = ?1 ORDER BY id",
            EVENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![guardrail_id], row_to_event)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

pub fn get_event(store: &Store, event_id: i64) -> Result<Option<GuardrailEvent>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "guardrail.event", |conn| {
        load_event(conn, event_id)
    })
}

pub(crate) fn load_event(conn: &Connection, event_id: i64) -> Result<Option<GuardrailEvent>, error::AimemError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM guardrail_events WHERE id = ?1", EVENT_COLUMNS),
            params![event_id],
            row_to_event,
        )
        .optional()?)
}

pub fn guardrail_history(store: &Store, guardrail_id: i64) -> Result<GuardrailHistory, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "guardrail.history", |conn| {
        history_in(conn, guardrail_id)
    })
}

// ============================================================================
// MATCHING
// ============================================================================

fn path_fragment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/[A-Za-z0-9_.\-]+/").expect("static regex"))
}

/// Keywords a guardrail matches on: quoted and backticked spans of its rule
/// text plus category-specific extras.
pub fn guardrail_keywords(guardrail: &Guardrail) -> KeywordSet {
    let rule = &guardrail.rule;
    let lower = rule.to_lowercase();
    let mut set = KeywordSet::default();
    for span in quoted_spans(rule) {
        set.insert(&span);
    }
    for span in backtick_spans(rule) {
        set.insert(&span);
    }

    match guardrail.category {
        GuardrailCategory::Naming => {
            for style in NamingStyle::ALL {
                if lower.contains(&style.as_str().to_lowercase()) {
                    set.insert(style.as_str());
                }
            }
        }
        GuardrailCategory::Architecture => {
            for m in path_fragment_re().find_iter(rule) {
                set.insert(m.as_str());
            }
        }
        GuardrailCategory::Security => {
            if lower.contains("auth") {
                for k in AUTH_EXTRA_KEYWORDS {
                    set.insert(k);
                }
            }
            if lower.contains("sanitiz") {
                for k in SANITIZE_EXTRA_KEYWORDS {
                    set.insert(k);
                }
            }
        }
        GuardrailCategory::Design | GuardrailCategory::Performance | GuardrailCategory::Testing => {}
    }
    set
}

/// Check `action_text` against the project's active guardrails using the
/// default keyword matcher.
pub fn check_guardrails(
    store: &Store,
    project_id: i64,
    action_text: &str,
    context_text: Option<&str>,
) -> Result<CheckResult, error::AimemError> {
    check_guardrails_with(store, project_id, action_text, context_text, guardrail_keywords)
}

/// Like [`check_guardrails`], with the classifier for each guardrail built by
/// `build`.
pub fn check_guardrails_with<F, C>(
    store: &Store,
    project_id: i64,
    action_text: &str,
    context_text: Option<&str>,
    build: F,
) -> Result<CheckResult, error::AimemError>
where
    F: Fn(&Guardrail) -> C,
    C: TextClassifier,
{
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    let haystack = format!("{} {}", action_text, context_text.unwrap_or("")).to_lowercase();
    let stored_action = output::truncate_chars(action_text, TRIGGER_ACTION_MAX_CHARS);

    broker.with_conn(&db_path, "aimem", None, "guardrail.check", |conn| {
        let tx = conn.unchecked_transaction()?;
        dik::ensure_dik_row(&tx, project_id)?;
        let dik_level = current_level(&tx, project_id)?;

        let mut violations = Vec::new();
        for guardrail in list_guardrails_in(&tx, project_id, None, false)? {
            let matched = build(&guardrail).classify(&haystack);
            if matched.is_empty() {
                continue;
            }
            violations.push(Violation {
                guardrail_id: guardrail.id,
                category: guardrail.category,
                rule: guardrail.rule,
                rationale: guardrail.rationale,
                severity: guardrail.severity,
                matched_keywords: matched,
                history: history_in(&tx, guardrail.id)?,
            });
        }

        let response = responder::render_response(&violations, dik_level);
        for v in &violations {
            insert_event(
                &tx,
                &NewEvent {
                    guardrail_id: v.guardrail_id,
                    event_type: EventType::Triggered,
                    context: Some(&stored_action),
                    response: Some(&response),
                    dik_level,
                    ref_event_id: None,
                },
            )?;
        }
        dik::bump_counter(&tx, project_id, DikCounter::Conversations, 1)?;
        tx.commit()?;

        Ok(CheckResult {
            violations,
            dik_level,
            response,
        })
    })
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// The user followed the guardrail. Returns the `accepted` event id.
pub fn accept_guardrail(store: &Store, guardrail_id: i64, project_id: i64) -> Result<i64, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "operator", None, "guardrail.accept", |conn| {
        let tx = conn.unchecked_transaction()?;
        load_project_guardrail(&tx, guardrail_id, project_id)?;
        let level = current_level(&tx, project_id)?;
        let id = insert_event(
            &tx,
            &NewEvent {
                guardrail_id,
                event_type: EventType::Accepted,
                context: None,
                response: None,
                dik_level: level,
                ref_event_id: None,
            },
        )?;
        dik::bump_counter(&tx, project_id, DikCounter::CorrectionsMade, 1)?;
        tx.commit()?;
        Ok(id)
    })
}

/// The user went against the guardrail. Returns the `overridden` event id;
/// attaching a vindication candidate to it is up to the caller.
pub fn override_guardrail(
    store: &Store,
    guardrail_id: i64,
    project_id: i64,
    reason: &str,
) -> Result<i64, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "operator", None, "guardrail.override", |conn| {
        load_project_guardrail(conn, guardrail_id, project_id)?;
        let level = current_level(conn, project_id)?;
        insert_event(
            conn,
            &NewEvent {
                guardrail_id,
                event_type: EventType::Overridden,
                context: Some(reason),
                response: None,
                dik_level: level,
                ref_event_id: None,
            },
        )
    })
}

/// Attach a pending vindication candidate to an `overridden` event.
pub fn attach_vindication_candidate(
    store: &Store,
    event_id: i64,
    candidate: &VindicationCandidate,
) -> Result<(), error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    let metadata = serde_json::to_string(candidate)?;
    broker.with_conn(&db_path, "aimem", None, "guardrail.candidate", |conn| {
        let event = load_event(conn, event_id)?
            .ok_or_else(|| error::AimemError::NotFound(format!("event {}", event_id)))?;
        if event.event_type != EventType::Overridden {
            return Err(error::AimemError::ValidationError(format!(
                "event {} is '{}', only overrides carry vindication candidates",
                event_id,
                event.event_type.as_str()
            )));
        }
        if event.metadata.is_some() {
            return Err(error::AimemError::ValidationError(format!(
                "event {} already has a vindication candidate",
                event_id
            )));
        }
        conn.execute(
            "UPDATE guardrail_events SET metadata = ?1 WHERE id = ?2 AND metadata IS NULL",
            params![metadata, event_id],
        )?;
        Ok(())
    })
}

/// Record that an override turned out wrong: the suggestion it rejected was
/// adopted after all. Returns the recomputed trust level.
///
/// Vindicating an override whose candidate is already resolved, or which
/// already has a `vindicated` event, changes nothing.
pub fn vindicate_override(store: &Store, event_id: i64, project_id: i64) -> Result<f64, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "guardrail.vindicate", |conn| {
        let tx = conn.unchecked_transaction()?;
        let level = match vindicate_in(&tx, event_id, project_id)? {
            Some(level) => level,
            None => current_level(&tx, project_id)?,
        };
        tx.commit()?;
        Ok(level)
    })
}

/// Like [`vindicate_override`], but `None` when nothing was written because
/// the override had already been resolved.
pub fn try_vindicate_override(
    store: &Store,
    event_id: i64,
    project_id: i64,
) -> Result<Option<f64>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "guardrail.vindicate", |conn| {
        let tx = conn.unchecked_transaction()?;
        let level = vindicate_in(&tx, event_id, project_id)?;
        tx.commit()?;
        Ok(level)
    })
}

/// Append the `vindicated` event and bump `overrides_regretted`. Returns the
/// new level, or `None` if the override was already resolved.
pub(crate) fn vindicate_in(
    conn: &Connection,
    event_id: i64,
    project_id: i64,
) -> Result<Option<f64>, error::AimemError> {
    let event = load_event(conn, event_id)?
        .ok_or_else(|| error::AimemError::NotFound(format!("event {}", event_id)))?;
    if event.event_type != EventType::Overridden {
        return Err(error::AimemError::ValidationError(format!(
            "event {} is '{}', only overrides can be vindicated",
            event_id,
            event.event_type.as_str()
        )));
    }
    load_project_guardrail(conn, event.guardrail_id, project_id)?;

    match event.metadata.as_deref() {
        Some(raw) => {
            let won = vindication::resolve_candidate_in(
                conn,
                event_id,
                raw,
                CandidateResolution::Vindicated,
                &time::now_epoch_z(),
            )?;
            if !won {
                return Ok(None);
            }
        }
        None => {
            let already: i64 = conn.query_row(
                "SELECT COUNT(*) FROM guardrail_events WHERE event_type = 'vindicated' AND ref_event_id = ?1",
                params![event_id],
                |row| row.get(0),
            )?;
            if already > 0 {
                return Ok(None);
            }
        }
    }

    dik::bump_counter(conn, project_id, DikCounter::OverridesRegretted, 1)?;
    let level = current_level(conn, project_id)?;
    insert_event(
        conn,
        &NewEvent {
            guardrail_id: event.guardrail_id,
            event_type: EventType::Vindicated,
            context: Some("later change matched the overridden suggestion"),
            response: None,
            dik_level: level,
            ref_event_id: Some(event_id),
        },
    )?;
    Ok(Some(level))
}
