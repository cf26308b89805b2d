//! Project registry and the structural facts the indexer records per project.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::dik;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub created_at: String,
}

/// One code structure as reported by the external indexer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CodeStructure {
    /// e.g. `function`, `method`, `class`, `struct`, `interface`
    pub kind: String,
    pub name: String,
    pub file_path: String,
    #[serde(default)]
    pub raw_text: String,
}

impl CodeStructure {
    pub fn new(kind: &str, name: &str, file_path: &str, raw_text: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            file_path: file_path.to_string(),
            raw_text: raw_text.to_string(),
        }
    }
}

fn row_to_project(row: &rusqlite::Row) -> Result<Project, rusqlite::Error> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Register `path` as a project. Registering the same path again returns the
/// existing id.
pub fn register_project(store: &Store, name: &str, path: &Path) -> Result<i64, error::AimemError> {
    let path_str = path.to_string_lossy().trim_end_matches('/').to_string();
    if path_str.is_empty() {
        return Err(error::AimemError::PathError(
            "project path must not be empty".to_string(),
        ));
    }
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);

    broker.with_conn(&db_path, "aimem", None, "project.register", |conn| {
        conn.execute(
            "INSERT OR IGNORE INTO projects(name, path, created_at) VALUES(?1, ?2, ?3)",
            params![name, path_str, time::now_epoch_z()],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM projects WHERE path = ?1",
            params![path_str],
            |row| row.get(0),
        )?;
        dik::ensure_dik_row(conn, id)?;
        Ok(id)
    })
}

pub fn get_project(store: &Store, project_id: i64) -> Result<Option<Project>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "project.get", |conn| {
        Ok(conn
            .query_row(
                "SELECT id, name, path, created_at FROM projects WHERE id = ?1",
                params![project_id],
                row_to_project,
            )
            .optional()?)
    })
}

pub fn list_projects(store: &Store) -> Result<Vec<Project>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "project.list", |conn| {
        let mut stmt = conn.prepare("SELECT id, name, path, created_at FROM projects ORDER BY id")?;
        let rows = stmt.query_map([], row_to_project)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// The registered project whose path is the longest component-wise prefix
/// of `cwd`.
pub fn detect_project(store: &Store, cwd: &Path) -> Result<Option<Project>, error::AimemError> {
    let mut best: Option<Project> = None;
    for project in list_projects(store)? {
        if !cwd.starts_with(Path::new(&project.path)) {
            continue;
        }
        let longer = best
            .as_ref()
            .map_or(true, |b| project.path.len() > b.path.len());
        if longer {
            best = Some(project);
        }
    }
    Ok(best)
}

/// Replace every recorded structure of a project with `structures`.
pub fn replace_structures(
    store: &Store,
    project_id: i64,
    structures: &[CodeStructure],
) -> Result<usize, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);

    broker.with_conn(&db_path, "indexer", None, "structures.replace", |conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM structures WHERE project_id = ?1", params![project_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO structures(project_id, kind, name, file_path, raw_text) VALUES(?1, ?2, ?3, ?4, ?5)",
            )?;
            for s in structures {
                stmt.execute(params![project_id, s.kind, s.name, s.file_path, s.raw_text])?;
            }
        }
        tx.commit()?;
        Ok(structures.len())
    })
}

/// Structures in insertion order.
pub fn list_structures(store: &Store, project_id: i64) -> Result<Vec<CodeStructure>, error::AimemError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::guardrails_db_path(&store.root);
    broker.with_conn(&db_path, "aimem", None, "structures.list", |conn| {
        let mut stmt = conn.prepare(
            "SELECT kind, name, file_path, raw_text FROM structures WHERE project_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(CodeStructure {
                kind: row.get(0)?,
                name: row.get(1)?,
                file_path: row.get(2)?,
                raw_text: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

#[derive(clap::Args, Debug)]
pub struct ProjectCli {
    #[clap(subcommand)]
    pub command: ProjectCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum ProjectCommand {
    /// Register a project directory
    Add {
        #[clap(long)]
        name: String,
        /// Project root (defaults to current working directory)
        #[clap(long)]
        path: Option<PathBuf>,
    },
    /// List registered projects
    List {
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Show which project a directory belongs to
    Detect {
        #[clap(long)]
        path: Option<PathBuf>,
    },
}

pub fn run_project_cli(store: &Store, cli: ProjectCli) -> Result<(), error::AimemError> {
    let cwd = std::env::current_dir()?;
    match cli.command {
        ProjectCommand::Add { name, path } => {
            let path = path.unwrap_or(cwd);
            let id = register_project(store, &name, &path)?;
            println!("✓ Project registered: {} (id: {})", name, id);
        }
        ProjectCommand::List { format } => {
            let projects = list_projects(store)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else if projects.is_empty() {
                println!("No projects registered yet.");
            } else {
                for p in projects {
                    println!("{:>4}  {}  {}", p.id, p.name, p.path);
                }
            }
        }
        ProjectCommand::Detect { path } => {
            let path = path.unwrap_or(cwd);
            match detect_project(store, &path)? {
                Some(p) => println!("{} (id: {}) at {}", p.name, p.id, p.path),
                None => println!("No registered project contains {}", path.display()),
            }
        }
    }
    Ok(())
}
