//! Store abstraction for aimem's persisted state.
//!
//! Two store locations are supported: a user-wide store shared by every
//! project on the machine, and a repo-scoped store living next to the code.

use crate::core::error::AimemError;
use std::path::{Path, PathBuf};

/// Directory name that marks a repo-scoped store.
pub const REPO_MARKER_DIR: &str = ".aimem";

/// Environment variable that pins the store root explicitly.
pub const DATA_DIR_ENV: &str = "AIMEM_DATA_DIR";

/// Store type discriminator.
///
/// - `User`: machine-wide state at `~/.aimem/data/`
/// - `Repo`: project-scoped state at `<repo>/.aimem/data/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    User,
    Repo,
}

/// Handle on a directory holding aimem's databases and audit log.
#[derive(Debug, Clone)]
pub struct Store {
    pub kind: StoreKind,
    /// Absolute path to the store root directory
    pub root: PathBuf,
}

impl Store {
    /// Resolve the store for a process started in `cwd`.
    ///
    /// `AIMEM_DATA_DIR` wins; otherwise the nearest `.aimem/` directory above
    /// `cwd` selects a repo store; otherwise the user store under `$HOME`.
    pub fn resolve(cwd: &Path) -> Result<Store, AimemError> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(Store {
                    kind: StoreKind::User,
                    root: PathBuf::from(dir),
                });
            }
        }

        if let Some(repo_root) = find_repo_root(cwd) {
            return Ok(Store {
                kind: StoreKind::Repo,
                root: repo_root.join(REPO_MARKER_DIR).join("data"),
            });
        }

        let home = std::env::var("HOME")?;
        Ok(Store {
            kind: StoreKind::User,
            root: PathBuf::from(home).join(REPO_MARKER_DIR).join("data"),
        })
    }
}

/// Walk up from `start_dir` looking for a `.aimem` marker directory.
pub fn find_repo_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(REPO_MARKER_DIR).is_dir() {
            return Some(current_dir);
        }
        if !current_dir.pop() {
            return None;
        }
    }
}
