//! DIK: the per-project trust level.
//!
//! The calculator half of this module is pure: counters in, level out.
//! The store half loads and bumps the `project_dik` row the counters live in.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

pub const DIK_MIN: f64 = 1.0;
pub const DIK_MAX: f64 = 10.0;
pub const DIK_BASE: f64 = 2.0;
/// Level stored for a project nobody has set by hand.
pub const DIK_DEFAULT_LEVEL: f64 = DIK_BASE;

const CONFIRMATION_BONUS_CAP: f64 = 2.0;
const CORRECTION_WEIGHT: f64 = 0.3;
const REGRET_WEIGHT: f64 = 1.0;
const TRACK_RECORD_CAP: f64 = 3.0;
const CONVERSATIONS_PER_POINT: f64 = 100.0;
const EXPERIENCE_CAP: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDik {
    pub project_id: i64,
    pub level: f64,
    /// Set only through [`set_manual_level`]; while set, `level` wins over
    /// the computed score.
    pub level_is_manual: bool,
    pub rules_confirmed: i64,
    pub rules_inferred: i64,
    pub corrections_made: i64,
    pub overrides_regretted: i64,
    pub conversations: i64,
    pub personality_enabled: bool,
    pub updated_at: String,
}

impl ProjectDik {
    /// Fresh row for a project with no history.
    pub fn new(project_id: i64) -> Self {
        Self {
            project_id,
            level: DIK_DEFAULT_LEVEL,
            level_is_manual: false,
            rules_confirmed: 0,
            rules_inferred: 0,
            corrections_made: 0,
            overrides_regretted: 0,
            conversations: 0,
            personality_enabled: true,
            updated_at: time::now_epoch_z(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DikBreakdown {
    pub base: f64,
    pub confirmation_bonus: f64,
    pub track_record: f64,
    pub experience: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DikTier {
    Low,
    Medium,
    High,
}

impl DikTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DikTier::Low => "low",
            DikTier::Medium => "medium",
            DikTier::High => "high",
        }
    }
}

/// Counters that feed the score. The numeric value of each variant's column
/// only ever goes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DikCounter {
    RulesConfirmed,
    RulesInferred,
    CorrectionsMade,
    OverridesRegretted,
    Conversations,
}

impl DikCounter {
    fn column(&self) -> &'static str {
        match self {
            DikCounter::RulesConfirmed => "rules_confirmed",
            DikCounter::RulesInferred => "rules_inferred",
            DikCounter::CorrectionsMade => "corrections_made",
            DikCounter::OverridesRegretted => "overrides_regretted",
            DikCounter::Conversations => "conversations",
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn components(dik: &ProjectDik) -> (f64, f64, f64) {
    let confirmation_bonus = if dik.rules_inferred > 0 {
        ((dik.rules_confirmed as f64 / dik.rules_inferred as f64) * 2.0)
            .min(CONFIRMATION_BONUS_CAP)
    } else {
        0.0
    };
    let track_record = (dik.corrections_made as f64 * CORRECTION_WEIGHT
        + dik.overrides_regretted as f64 * REGRET_WEIGHT)
        .min(TRACK_RECORD_CAP);
    let experience = (dik.conversations as f64 / CONVERSATIONS_PER_POINT).min(EXPERIENCE_CAP);
    (confirmation_bonus, track_record, experience)
}

/// The score the counters earn, ignoring any manual level.
pub fn computed_dik(dik: &ProjectDik) -> f64 {
    let (bonus, track, experience) = components(dik);
    round_to(
        (DIK_BASE + bonus + track + experience).clamp(DIK_MIN, DIK_MAX),
        1,
    )
}

/// Effective trust level: the manual level when one is set, otherwise the
/// computed score.
pub fn calculate_dik(dik: &ProjectDik) -> f64 {
    if dik.level_is_manual {
        return dik.level.clamp(DIK_MIN, DIK_MAX);
    }
    computed_dik(dik)
}

pub fn dik_breakdown(dik: &ProjectDik) -> DikBreakdown {
    let (bonus, track, experience) = components(dik);
    DikBreakdown {
        base: round_to(DIK_BASE, 2),
        confirmation_bonus: round_to(bonus, 2),
        track_record: round_to(track, 2),
        experience: round_to(experience, 2),
        total: computed_dik(dik),
    }
}

pub fn dik_tier(level: f64) -> DikTier {
    if level <= 4.0 {
        DikTier::Low
    } else if level <= 7.0 {
        DikTier::Medium
    } else {
        DikTier::High
    }
}

pub fn describe_dik_level(level: f64) -> &'static str {
    if level <= 2.0 {
        "New here. Learning this codebase and deferring to you."
    } else if level <= 4.0 {
        "Getting familiar. Will mention conventions, but you call the shots."
    } else if level <= 6.0 {
        "Established. Knows the project's patterns and will point out drift."
    } else if level <= 8.0 {
        "Trusted. Has a track record here and will push back on violations."
    } else {
        "Senior voice. Has been right before and will argue for the conventions."
    }
}

pub fn personality_injection(level: f64) -> &'static str {
    if level <= 2.0 {
        "You are new to this project. Ask before assuming conventions and accept corrections gracefully."
    } else if level <= 4.0 {
        "You know a little about this project. Mention relevant conventions briefly, without insisting."
    } else if level <= 6.0 {
        "You know this project's conventions. Point out deviations clearly and explain the established pattern."
    } else if level <= 8.0 {
        "You have earned trust on this project. Push back firmly on convention violations and cite past outcomes."
    } else {
        "You have been proven right on this project before. Defend its conventions with confidence, and say so when history backs you up."
    }
}

// ============================================================================
// STORE
// ============================================================================

fn row_to_dik(row: &rusqlite::Row) -> Result<ProjectDik, rusqlite::Error> {
    Ok(ProjectDik {
        project_id: row.get(0)?,
        level: row.get(1)?,
        level_is_manual: row.get::<_, i64>(2)? != 0,
        rules_confirmed: row.get(3)?,
        rules_inferred: row.get(4)?,
        corrections_made: row.get(5)?,
        overrides_regretted: row.get(6)?,
        conversations: row.get(7)?,
        personality_enabled: row.get::<_, i64>(8)? != 0,
        updated_at: row.get(9)?,
    })
}

/// Insert the default row if the project has none yet.
pub(crate) fn ensure_dik_row(conn: &Connection, project_id: i64) -> Result<(), error::AimemError> {
    conn.execute(
        "INSERT OR IGNORE INTO project_dik(project_id, level, updated_at) VALUES(?1, ?2, ?3)",
        params![project_id, DIK_DEFAULT_LEVEL, time::now_epoch_z()],
    )?;
    Ok(())
}

pub(crate) fn load_dik(conn: &Connection, project_id: i64) -> Result<ProjectDik, error::AimemError> {
    let row = conn
        .query_row(
            "SELECT project_id, level, level_is_manual, rules_confirmed, rules_inferred,
                    corrections_made, overrides_regretted, conversations, personality_enabled, updated_at
             FROM project_dik WHERE project_id = ?1",
            params![project_id],
            row_to_dik,
        )
        .optional()?;
    Ok(row.unwrap_or_else(|| ProjectDik::new(project_id)))
}

pub(crate) fn bump_counter(
    conn: &Connection,
    project_id: i64,
    counter: DikCounter,
    by: i64,
) -> Result<(), error::AimemError> {
    if by < 0 {
        return Err(error::AimemError::ValidationError(format!(
            "counter '{}' cannot decrease",
            counter.column()
        )));
    }
    ensure_dik_row(conn, project_id)?;
    let sql = format!(
        "UPDATE project_dik SET {col} = {col} + ?1, updated_at = ?2 WHERE project_id = ?3",
        col = counter.column()
    );
    conn.execute(&sql, params![by, time::now_epoch_z(), project_id])?;
    Ok(())
}

pub fn get_project_dik(store: &Store, project_id: i64) -> Result<ProjectDik, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "dik.get", |conn| {
        load_dik(conn, project_id)
    })
}

pub fn current_dik_level(store: &Store, project_id: i64) -> Result<f64, error::AimemError> {
    Ok(calculate_dik(&get_project_dik(store, project_id)?))
}

pub fn increment_counter(
    store: &Store,
    project_id: i64,
    counter: DikCounter,
) -> Result<(), error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "dik.increment", |conn| {
        bump_counter(conn, project_id, counter, 1)
    })
}

pub fn set_manual_level(store: &Store, project_id: i64, level: f64) -> Result<f64, error::AimemError> {
    if !(DIK_MIN..=DIK_MAX).contains(&level) {
        return Err(error::AimemError::ValidationError(format!(
            "DIK level must be between {} and {}, got {}",
            DIK_MIN, DIK_MAX, level
        )));
    }
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "operator", None, "dik.set", |conn| {
        ensure_dik_row(conn, project_id)?;
        conn.execute(
            "UPDATE project_dik SET level = ?1, level_is_manual = 1, updated_at = ?2 WHERE project_id = ?3",
            params![round_to(level, 1), time::now_epoch_z(), project_id],
        )?;
        Ok(calculate_dik(&load_dik(conn, project_id)?))
    })
}

/// Drop a manual level; the computed score applies again.
pub fn clear_manual_level(store: &Store, project_id: i64) -> Result<f64, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "operator", None, "dik.clear", |conn| {
        ensure_dik_row(conn, project_id)?;
        conn.execute(
            "UPDATE project_dik SET level = ?1, level_is_manual = 0, updated_at = ?2 WHERE project_id = ?3",
            params![DIK_DEFAULT_LEVEL, time::now_epoch_z(), project_id],
        )?;
        Ok(calculate_dik(&load_dik(conn, project_id)?))
    })
}

pub fn set_personality(store: &Store, project_id: i64, enabled: bool) -> Result<(), error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "operator", None, "dik.personality", |conn| {
        ensure_dik_row(conn, project_id)?;
        conn.execute(
            "UPDATE project_dik SET personality_enabled = ?1, updated_at = ?2 WHERE project_id = ?3",
            params![enabled as i64, time::now_epoch_z(), project_id],
        )?;
        Ok(())
    })
}

// ============================================================================
// CLI
// ============================================================================

#[derive(clap::Args, Debug)]
pub struct DikCli {
    #[clap(subcommand)]
    pub command: DikCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum DikCommand {
    /// Show the trust level, its components and what it means
    Status {
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Pin the trust level by hand (1-10)
    Set {
        #[clap(long)]
        level: f64,
    },
    /// Drop a manual level and go back to the computed score
    Clear,
    /// Turn the trust-dependent personality prompt on or off
    Personality {
        #[clap(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

pub fn run_dik_cli(store: &Store, project_id: i64, cli: DikCli) -> Result<(), error::AimemError> {
    use colored::Colorize;

    match cli.command {
        DikCommand::Status { format } => {
            let dik = get_project_dik(store, project_id)?;
            let level = calculate_dik(&dik);
            let breakdown = dik_breakdown(&dik);
            if format == "json" {
                let report = serde_json::json!({
                    "project_id": project_id,
                    "level": level,
                    "tier": dik_tier(level).as_str(),
                    "manual": dik.level_is_manual,
                    "breakdown": breakdown,
                    "counters": &dik,
                    "description": describe_dik_level(level),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            println!(
                "{} {:.1} ({})",
                "DIK".bright_cyan().bold(),
                level,
                dik_tier(level).as_str()
            );
            if dik.level_is_manual {
                println!("  set manually; computed score is {:.1}", breakdown.total);
            }
            println!("  base                {:>5.2}", breakdown.base);
            println!("  confirmation bonus  {:>5.2}", breakdown.confirmation_bonus);
            println!("  track record        {:>5.2}", breakdown.track_record);
            println!("  experience          {:>5.2}", breakdown.experience);
            println!("  {}", describe_dik_level(level).italic());
            if dik.personality_enabled {
                println!("\n{} {}", "Prompt:".bold(), personality_injection(level));
            }
        }
        DikCommand::Set { level } => {
            let level = set_manual_level(store, project_id, level)?;
            println!("✓ DIK pinned at {:.1}", level);
        }
        DikCommand::Clear => {
            let level = clear_manual_level(store, project_id)?;
            println!("✓ Manual DIK cleared; computed level is {:.1}", level);
        }
        DikCommand::Personality { enabled } => {
            set_personality(store, project_id, enabled)?;
            println!(
                "✓ Personality prompt {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }
    Ok(())
}
