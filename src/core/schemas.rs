//! Database schema definitions.
//!
//! aimem keeps everything in one SQLite file per store:
//! projects and the structural facts the indexer supplies, the guardrails
//! inferred or declared for each project, their append-only event history,
//! and the per-project trust (DIK) row.

pub const GUARDRAILS_DB_NAME: &str = "guardrails.db";

pub const SCHEMA_PROJECTS: &str = "
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        path TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )
";

pub const SCHEMA_STRUCTURES: &str = "
    CREATE TABLE IF NOT EXISTS structures (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        raw_text TEXT NOT NULL DEFAULT '',
        FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
    )
";

pub const SCHEMA_GUARDRAILS: &str = "
    CREATE TABLE IF NOT EXISTS guardrails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL,
        category TEXT NOT NULL,
        rule TEXT NOT NULL,
        rationale TEXT,
        severity TEXT NOT NULL DEFAULT 'warn', -- info, warn, block
        source TEXT NOT NULL,                  -- inferred, explicit, imported
        confirmed INTEGER NOT NULL DEFAULT 0,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
";

pub const SCHEMA_GUARDRAIL_EVENTS: &str = "
    CREATE TABLE IF NOT EXISTS guardrail_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        guardrail_id INTEGER NOT NULL,
        event_type TEXT NOT NULL, -- triggered, overridden, accepted, vindicated
        context TEXT,
        response TEXT,
        dik_level REAL NOT NULL,
        ref_event_id INTEGER,     -- vindicated -> the override it resolves
        metadata TEXT,            -- JSON vindication candidate on overrides
        created_at TEXT NOT NULL,
        FOREIGN KEY(guardrail_id) REFERENCES guardrails(id)
    )
";

pub const SCHEMA_PROJECT_DIK: &str = "
    CREATE TABLE IF NOT EXISTS project_dik (
        project_id INTEGER PRIMARY KEY,
        level REAL NOT NULL DEFAULT 2.0,
        level_is_manual INTEGER NOT NULL DEFAULT 0,
        rules_confirmed INTEGER NOT NULL DEFAULT 0,
        rules_inferred INTEGER NOT NULL DEFAULT 0,
        corrections_made INTEGER NOT NULL DEFAULT 0,
        overrides_regretted INTEGER NOT NULL DEFAULT 0,
        conversations INTEGER NOT NULL DEFAULT 0,
        personality_enabled INTEGER NOT NULL DEFAULT 1,
        updated_at TEXT NOT NULL
    )
";

pub const SCHEMA_INDEX_STRUCTURES_PROJECT: &str =
    "CREATE INDEX IF NOT EXISTS idx_structures_project ON structures(project_id)";
pub const SCHEMA_INDEX_GUARDRAILS_PROJECT: &str =
    "CREATE INDEX IF NOT EXISTS idx_guardrails_project ON guardrails(project_id, active)";
pub const SCHEMA_INDEX_EVENTS_GUARDRAIL: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_guardrail ON guardrail_events(guardrail_id, event_type)";

pub const GUARDRAILS_DB_SCHEMA: &[&str] = &[
    SCHEMA_PROJECTS,
    SCHEMA_STRUCTURES,
    SCHEMA_GUARDRAILS,
    SCHEMA_GUARDRAIL_EVENTS,
    SCHEMA_PROJECT_DIK,
    SCHEMA_INDEX_STRUCTURES_PROJECT,
    SCHEMA_INDEX_GUARDRAILS_PROJECT,
    SCHEMA_INDEX_EVENTS_GUARDRAIL,
];
