use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, error::AimemError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::AimemError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::AimemError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::AimemError::RusqliteError)?;
    Ok(conn)
}

pub fn guardrails_db_path(root: &Path) -> PathBuf {
    root.join(schemas::GUARDRAILS_DB_NAME)
}

/// Create the store directory and every table aimem owns. Safe to call on
/// every invocation.
pub fn initialize_guardrails_db(root: &Path) -> Result<(), error::AimemError> {
    fs::create_dir_all(root).map_err(error::AimemError::IoError)?;
    let db_path = guardrails_db_path(root);

    let broker = DbBroker::new(root);
    broker.with_conn(&db_path, "aimem", None, "guardrails.init", |conn| {
        for stmt in schemas::GUARDRAILS_DB_SCHEMA {
            conn.execute(stmt, [])?;
        }
        Ok(())
    })
}
