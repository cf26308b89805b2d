//! Vindication: noticing that an overridden suggestion was adopted later.
//!
//! An `overridden` event can carry a candidate snapshot of the code the
//! suggestion was about. When that file changes, the stored line range is
//! re-read and compared against the suggestion text. A candidate is resolved
//! exactly once: vindicated, checked and not vindicated, or expired.
//! Resolution is a compare-and-swap on the stored metadata, so two processes
//! racing on the same candidate cannot both win.

use crate::core::broker::DbBroker;
use crate::core::config::{self, Thresholds};
use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::guardrails;
use crate::plugins::projects;
use crate::plugins::matcher::{KeywordSet, TextClassifier, backtick_spans, quoted_spans};
use regex::Regex;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// Identifier tokens that say nothing about the suggested change.
pub const SUGGESTION_STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "from", "into", "use", "using", "instead", "add",
    "include", "implement", "remove", "delete", "drop", "should", "could", "would", "not", "are",
    "was", "were", "will", "can", "you", "your", "our", "its", "here", "there", "then", "than",
    "when", "all", "any", "each", "more", "less", "also", "only", "just", "make", "sure", "please",
    "code", "function", "method", "file", "line", "lines", "better", "rather",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateResolution {
    Vindicated,
    NotVindicated,
    Expired,
}

impl CandidateResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateResolution::Vindicated => "vindicated",
            CandidateResolution::NotVindicated => "not_vindicated",
            CandidateResolution::Expired => "expired",
        }
    }
}

fn default_pending() -> bool {
    true
}

/// Snapshot of the suggestion an override rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VindicationCandidate {
    pub suggestion: String,
    pub file_path: String,
    /// 1-based, inclusive.
    pub line_start: usize,
    pub line_end: usize,
    pub code_hash: String,
    #[serde(default)]
    pub original_code: Option<String>,
    #[serde(default = "default_pending")]
    pub pending: bool,
    #[serde(default)]
    pub checked_at: Option<String>,
    #[serde(default)]
    pub resolution: Option<CandidateResolution>,
}

impl VindicationCandidate {
    pub fn new(
        suggestion: &str,
        file_path: &str,
        line_start: usize,
        line_end: usize,
        original_code: &str,
    ) -> Self {
        Self {
            suggestion: suggestion.to_string(),
            file_path: file_path.to_string(),
            line_start,
            line_end,
            code_hash: hash_code(original_code),
            original_code: Some(original_code.to_string()),
            pending: true,
            checked_at: None,
            resolution: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VindicationResult {
    pub vindicated: bool,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
    pub reason: String,
}

/// A still-pending candidate together with the override that carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCandidate {
    pub event_id: i64,
    pub guardrail_id: i64,
    pub created_at: String,
    pub candidate: VindicationCandidate,
}

/// Per-candidate result of a file pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCheckOutcome {
    pub event_id: i64,
    pub guardrail_id: i64,
    pub result: VindicationResult,
    pub new_dik_level: Option<f64>,
    /// Set when resolving this candidate failed; it stays pending.
    pub error: Option<String>,
}

pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lines `line_start..=line_end` (1-based) of `content`, clamped to the file.
pub fn snapshot_range(content: &str, line_start: usize, line_end: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_start.max(1) - 1;
    let end = line_end.min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

// ============================================================================
// HEURISTIC CHECK
// ============================================================================

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("static regex"))
}

fn use_instead_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\buse\s+[`"']?([\w.\-]+)[`"']?\s+instead\s+of\s+[`"']?([\w.\-]+)"#)
            .expect("static regex")
    })
}

fn add_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:add|include|implement)\s+(?:an?\s+|the\s+)?[`"']?([\w.\-]+)"#)
            .expect("static regex")
    })
}

fn remove_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:remove|delete|drop)\s+(?:an?\s+|the\s+)?[`"']?([\w.\-]+)"#)
            .expect("static regex")
    })
}

/// Keywords of a suggestion: quoted and backticked spans, then identifier
/// tokens of three or more characters that are not stopwords.
pub fn extract_suggestion_keywords(suggestion: &str) -> KeywordSet {
    let mut set = KeywordSet::default();
    for span in quoted_spans(suggestion) {
        set.insert(&span);
    }
    for span in backtick_spans(suggestion) {
        set.insert(&span);
    }
    for m in identifier_re().find_iter(suggestion) {
        let token = m.as_str().to_lowercase();
        if token.chars().count() >= 3 && !SUGGESTION_STOPWORDS.contains(&token.as_str()) {
            set.insert(&token);
        }
    }
    set
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Highest confidence any suggestion shape gives for this change.
fn pattern_confidence(suggestion: &str, original: Option<&str>, new_code: &str, t: &Thresholds) -> f64 {
    let mut best: f64 = 0.0;

    for caps in use_instead_re().captures_iter(suggestion) {
        let wanted = &caps[1];
        let unwanted = &caps[2];
        let had_unwanted = original.is_some_and(|o| contains(o, unwanted));
        if !contains(new_code, wanted) {
            continue;
        }
        if had_unwanted && !contains(new_code, unwanted) {
            best = best.max(t.use_instead_full);
        } else {
            best = best.max(t.use_instead_partial);
        }
    }

    if let Some(original) = original {
        for caps in add_re().captures_iter(suggestion) {
            let item = &caps[1];
            if !contains(original, item) && contains(new_code, item) {
                best = best.max(t.add_pattern);
            }
        }
        for caps in remove_re().captures_iter(suggestion) {
            let item = &caps[1];
            if contains(original, item) && !contains(new_code, item) {
                best = best.max(t.remove_pattern);
            }
        }
    }
    best
}

pub fn is_vindicated(confidence: f64, t: &Thresholds) -> bool {
    confidence >= t.vindication
}

pub fn check_for_vindication(candidate: &VindicationCandidate, new_code: &str) -> VindicationResult {
    check_for_vindication_with(candidate, new_code, &Thresholds::default())
}

pub fn check_for_vindication_with(
    candidate: &VindicationCandidate,
    new_code: &str,
    thresholds: &Thresholds,
) -> VindicationResult {
    if hash_code(new_code) == candidate.code_hash {
        return VindicationResult {
            vindicated: false,
            confidence: 0.0,
            matched_keywords: Vec::new(),
            reason: "code has not changed".to_string(),
        };
    }

    let keywords = extract_suggestion_keywords(&candidate.suggestion);
    let matched = keywords.classify(new_code);
    let keyword_confidence = if keywords.is_empty() {
        0.0
    } else {
        matched.len() as f64 / keywords.len() as f64
    };
    let confidence = keyword_confidence.max(pattern_confidence(
        &candidate.suggestion,
        candidate.original_code.as_deref(),
        new_code,
        thresholds,
    ));

    let vindicated = is_vindicated(confidence, thresholds);
    let reason = if vindicated {
        if matched.is_empty() {
            "code now follows the suggested change".to_string()
        } else {
            format!("matched: {}", matched.iter().take(3).cloned().collect::<Vec<_>>().join(", "))
        }
    } else if confidence >= thresholds.partial_match {
        format!(
            "partial match: {}",
            matched.iter().take(2).cloned().collect::<Vec<_>>().join(", ")
        )
    } else {
        "no match with the overridden suggestion".to_string()
    };

    VindicationResult {
        vindicated,
        confidence,
        matched_keywords: matched,
        reason,
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Move a pending candidate to `resolution`. Returns `false` without writing
/// if it is already resolved or another writer resolved it first.
pub(crate) fn resolve_candidate_in(
    conn: &Connection,
    event_id: i64,
    raw_metadata: &str,
    resolution: CandidateResolution,
    now: &str,
) -> Result<bool, error::AimemError> {
    let mut candidate: VindicationCandidate = serde_json::from_str(raw_metadata)?;
    if !candidate.pending {
        return Ok(false);
    }
    candidate.pending = false;
    candidate.checked_at = Some(now.to_string());
    candidate.resolution = Some(resolution);
    let updated = serde_json::to_string(&candidate)?;
    let changed = conn.execute(
        "UPDATE guardrail_events SET metadata = ?1 WHERE id = ?2 AND metadata = ?3",
        params![updated, event_id, raw_metadata],
    )?;
    Ok(changed == 1)
}

/// Pending candidates of a project, oldest first. Rows whose metadata does
/// not parse are skipped with a warning.
fn pending_in(
    conn: &Connection,
    project_id: i64,
    file_path: Option<&str>,
) -> Result<Vec<(PendingCandidate, String)>, error::AimemError> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.guardrail_id, e.created_at, e.metadata
         FROM guardrail_events e JOIN guardrails g ON g.id = e.guardrail_id
         WHERE g.project_id = ?1 AND e.event_type = 'overridden' AND e.metadata IS NOT NULL
         ORDER BY e.id",
    )?;
    let rows = stmt.query_map(params![project_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut out = Vec::new();
    for r in rows {
        let (event_id, guardrail_id, created_at, raw) = r?;
        let candidate: VindicationCandidate = match serde_json::from_str(&raw) {
            Ok(c) => c,
            Err(e) => {
                eprintln!(
                    "warning: skipping malformed vindication candidate on event {}: {}",
                    event_id, e
                );
                continue;
            }
        };
        if !candidate.pending {
            continue;
        }
        if file_path.is_some_and(|f| f != candidate.file_path) {
            continue;
        }
        out.push((
            PendingCandidate {
                event_id,
                guardrail_id,
                created_at,
                candidate,
            },
            raw,
        ));
    }
    Ok(out)
}

/// Pending candidates for a project, optionally only those recorded for
/// `file_path`. Any spelling of the file that resolves to the same place
/// matches.
pub fn pending_candidates(
    store: &Store,
    project_id: i64,
    file_path: Option<&str>,
) -> Result<Vec<PendingCandidate>, error::AimemError> {
    let key = match file_path {
        Some(f) => Some(candidate_file(store, project_id, f)?.key),
        None => None,
    };
    pending_for_key(store, project_id, key.as_deref())
}

fn pending_for_key(
    store: &Store,
    project_id: i64,
    key: Option<&str>,
) -> Result<Vec<PendingCandidate>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "vindication.pending", |conn| {
        Ok(pending_in(conn, project_id, key)?
            .into_iter()
            .map(|(p, _)| p)
            .collect())
    })
}

/// A file as candidates refer to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Path relative to the project root with `/` separators, or the absolute
    /// path when the file lies outside the project.
    pub key: String,
    /// Absolute path to read the content from.
    pub path: PathBuf,
}

/// Drop `.` and fold `..` without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute and symlink-free. For a path that does not exist (yet), the
/// deepest existing ancestor is resolved and the rest appended as written.
fn absolute_path(path: &Path) -> Result<PathBuf, error::AimemError> {
    let joined = if path.is_absolute() {
        lexical_clean(path)
    } else {
        lexical_clean(&env::current_dir()?.join(path))
    };
    let mut existing = joined.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(real) = fs::canonicalize(existing) {
            return Ok(rest.iter().rev().fold(real, |acc, part| acc.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(joined.clone()),
        }
    }
}

/// Resolve `file_path` (relative paths against the working directory) and
/// key it relative to the project root.
pub fn candidate_file(
    store: &Store,
    project_id: i64,
    file_path: &str,
) -> Result<CandidateFile, error::AimemError> {
    let path = absolute_path(Path::new(file_path))?;
    let project = projects::get_project(store, project_id)?
        .ok_or_else(|| error::AimemError::NotFound(format!("project {}", project_id)))?;
    let root = absolute_path(Path::new(&project.path))?;
    let key = match path.strip_prefix(&root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        _ => path.to_string_lossy().to_string(),
    };
    Ok(CandidateFile { key, path })
}

/// Terminal "checked, not vindicated". Returns `false` if the candidate was
/// already resolved.
pub fn mark_not_vindicated(store: &Store, event_id: i64) -> Result<bool, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "vindication.not_vindicated", |conn| {
        let event = guardrails::load_event(conn, event_id)?
            .ok_or_else(|| error::AimemError::NotFound(format!("event {}", event_id)))?;
        let raw = event.metadata.ok_or_else(|| {
            error::AimemError::NotFound(format!("vindication candidate on event {}", event_id))
        })?;
        resolve_candidate_in(
            conn,
            event_id,
            &raw,
            CandidateResolution::NotVindicated,
            &time::now_epoch_z(),
        )
    })
}

/// Re-check every pending candidate recorded for `file_path` against the
/// file's current content. A missing or unreadable file yields nothing.
pub fn check_file_for_vindications(
    store: &Store,
    project_id: i64,
    file_path: &str,
) -> Result<Vec<FileCheckOutcome>, error::AimemError> {
    let file = candidate_file(store, project_id, file_path)?;
    let pending = pending_for_key(store, project_id, Some(&file.key))?;
    if pending.is_empty() {
        return Ok(Vec::new());
    }
    let content = match fs::read_to_string(&file.path) {
        Ok(c) => c,
        Err(_) => return Ok(Vec::new()),
    };
    let thresholds = config::load_config(&store.root)?.thresholds;

    let mut outcomes = Vec::with_capacity(pending.len());
    for p in pending {
        let c = &p.candidate;
        let new_code = snapshot_range(&content, c.line_start, c.line_end);
        let result = check_for_vindication_with(c, &new_code, &thresholds);

        let mut outcome = FileCheckOutcome {
            event_id: p.event_id,
            guardrail_id: p.guardrail_id,
            result,
            new_dik_level: None,
            error: None,
        };
        let resolved = if outcome.result.vindicated {
            guardrails::try_vindicate_override(store, p.event_id, project_id)
        } else {
            mark_not_vindicated(store, p.event_id).map(|_| None)
        };
        match resolved {
            Ok(level) => outcome.new_dik_level = level,
            Err(e) => {
                eprintln!(
                    "warning: vindication check for event {} failed: {}",
                    p.event_id, e
                );
                outcome.error = Some(e.to_string());
            }
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

pub fn expire_old(store: &Store, project_id: i64, max_age_days: u64) -> Result<usize, error::AimemError> {
    expire_old_as_of(store, project_id, max_age_days, time::now_secs())
}

/// Expire candidates created more than `max_age_days` before `now_secs`.
/// No `vindicated` events are written. Returns how many were expired.
pub fn expire_old_as_of(
    store: &Store,
    project_id: i64,
    max_age_days: u64,
    now_secs: u64,
) -> Result<usize, error::AimemError> {
    let cutoff = now_secs.saturating_sub(max_age_days.saturating_mul(time::SECS_PER_DAY));
    let stamp = time::epoch_z(now_secs);
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);

    broker.with_conn(&db_path, "aimem", None, "vindication.expire", |conn| {
        let tx = conn.unchecked_transaction()?;
        let mut expired = 0;
        for (p, raw) in pending_in(&tx, project_id, None)? {
            let Some(created) = time::parse_epoch_z(&p.created_at) else {
                eprintln!(
                    "warning: event {} has unreadable timestamp '{}'",
                    p.event_id, p.created_at
                );
                continue;
            };
            if created >= cutoff {
                continue;
            }
            if resolve_candidate_in(&tx, p.event_id, &raw, CandidateResolution::Expired, &stamp)? {
                expired += 1;
            }
        }
        tx.commit()?;
        Ok(expired)
    })
}

/// Override a guardrail and attach a candidate snapshotting lines
/// `line_start..=line_end` of `file_path` as they are now.
#[allow(clippy::too_many_arguments)]
pub fn record_override_with_snapshot(
    store: &Store,
    guardrail_id: i64,
    project_id: i64,
    reason: &str,
    suggestion: &str,
    file_path: &str,
    line_start: usize,
    line_end: usize,
) -> Result<i64, error::AimemError> {
    if line_start == 0 || line_end < line_start {
        return Err(error::AimemError::ValidationError(format!(
            "invalid line range {}..{}",
            line_start, line_end
        )));
    }
    let file = candidate_file(store, project_id, file_path)?;
    let content = fs::read_to_string(&file.path)?;
    let original = snapshot_range(&content, line_start, line_end);
    let candidate = VindicationCandidate::new(suggestion, &file.key, line_start, line_end, &original);

    let event_id = guardrails::override_guardrail(store, guardrail_id, project_id, reason)?;
    guardrails::attach_vindication_candidate(store, event_id, &candidate)?;
    Ok(event_id)
}

// ============================================================================
// QUEUE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCheck {
    pub candidate: VindicationCandidate,
    pub new_code: String,
    pub queued_at: String,
}

/// In-memory staging area for checks that will be presented together.
/// Nothing here is persisted; the store's pending flags stay authoritative.
#[derive(Debug, Default)]
pub struct VindicationQueue {
    entries: HashMap<i64, QueuedCheck>,
}

impl VindicationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a check, replacing any earlier one for the same event.
    pub fn enqueue(
        &mut self,
        event_id: i64,
        candidate: VindicationCandidate,
        new_code: String,
    ) -> Option<QueuedCheck> {
        self.entries.insert(
            event_id,
            QueuedCheck {
                candidate,
                new_code,
                queued_at: time::now_epoch_z(),
            },
        )
    }

    pub fn remove(&mut self, event_id: i64) -> Option<QueuedCheck> {
        self.entries.remove(&event_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Staged event ids, ascending.
    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Run the heuristic over every staged check without touching the store.
    pub fn evaluate(&self, thresholds: &Thresholds) -> Vec<(i64, VindicationResult)> {
        self.ids()
            .into_iter()
            .filter_map(|id| {
                self.entries
                    .get(&id)
                    .map(|q| (id, check_for_vindication_with(&q.candidate, &q.new_code, thresholds)))
            })
            .collect()
    }

    pub fn drain(&mut self) -> Vec<(i64, QueuedCheck)> {
        let mut out: Vec<(i64, QueuedCheck)> = self.entries.drain().collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }
}

// ============================================================================
// CLI
// ============================================================================

/// Default age after which an unresolved candidate is given up on.
pub const DEFAULT_EXPIRY_DAYS: u64 = 30;

#[derive(clap::Args, Debug)]
pub struct VindicateCli {
    #[clap(subcommand)]
    pub command: VindicateCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum VindicateCommand {
    /// Re-check pending overrides recorded against a file
    File {
        #[clap(long)]
        path: String,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// List overrides still waiting for a verdict
    Pending {
        #[clap(long)]
        path: Option<String>,
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Give up on candidates older than the cutoff
    Expire {
        #[clap(long, default_value_t = DEFAULT_EXPIRY_DAYS)]
        days: u64,
    },
}

pub fn run_vindicate_cli(store: &Store, project_id: i64, cli: VindicateCli) -> Result<(), error::AimemError> {
    use colored::Colorize;

    match cli.command {
        VindicateCommand::File { path, format } => {
            let outcomes = check_file_for_vindications(store, project_id, &path)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            } else if outcomes.is_empty() {
                println!("No pending overrides for {}", path);
            } else {
                for o in outcomes {
                    let verdict = if o.error.is_some() {
                        "error".red().bold()
                    } else if o.result.vindicated {
                        "vindicated".bright_green().bold()
                    } else {
                        "not vindicated".yellow()
                    };
                    println!(
                        "event {:>4}  {}  confidence {:.2}  {}",
                        o.event_id, verdict, o.result.confidence, o.result.reason
                    );
                    if let Some(level) = o.new_dik_level {
                        println!("            DIK is now {:.1}", level);
                    }
                    if let Some(err) = o.error {
                        println!("            {}", err);
                    }
                }
            }
        }
        VindicateCommand::Pending { path, format } => {
            let pending = pending_candidates(store, project_id, path.as_deref())?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&pending)?);
            } else if pending.is_empty() {
                println!("No pending overrides.");
            } else {
                for p in pending {
                    println!(
                        "event {:>4}  {}:{}-{}  {}",
                        p.event_id,
                        p.candidate.file_path,
                        p.candidate.line_start,
                        p.candidate.line_end,
                        crate::core::output::compact_line(&p.candidate.suggestion, 60)
                    );
                }
            }
        }
        VindicateCommand::Expire { days } => {
            let n = expire_old(store, project_id, days)?;
            println!("✓ Expired {} candidate(s) older than {} days", n, days);
        }
    }
    Ok(())
}
