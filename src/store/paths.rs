use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

use crate::store::document::Scope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub home: PathBuf,
    pub store_root: PathBuf,
    pub legacy_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl StorePaths {
    /// Layout rooted at `store_root` with legacy files read from the same
    /// directory, as the pre-migration tool kept them.
    pub fn under(store_root: impl Into<PathBuf>) -> Self {
        let store_root = store_root.into();
        Self {
            home: store_root.clone(),
            legacy_dir: store_root.clone(),
            logs_dir: store_root.join("logs"),
            store_root,
        }
    }

    pub fn with_legacy_dir(mut self, legacy_dir: impl Into<PathBuf>) -> Self {
        self.legacy_dir = legacy_dir.into();
        self
    }

    pub fn scope_dir(&self, scope: Scope) -> PathBuf {
        self.store_root.join(scope.dir_name())
    }

    pub fn audit_log(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn default_home(user_home: &Path) -> PathBuf {
    user_home.join(".scaffold")
}

pub fn resolve_paths() -> Result<StorePaths> {
    let home = match env::var("SCAFFOLD_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => default_home(&required_home_dir()?),
    };

    let store_root = env_or_default_path("SCAFFOLD_STORE_ROOT", home.join("configs"));
    let legacy_dir = env_or_default_path("SCAFFOLD_LEGACY_DIR", store_root.clone());
    let logs_dir = env_or_default_path("SCAFFOLD_LOGS_DIR", store_root.join("logs"));

    Ok(StorePaths {
        home,
        store_root,
        legacy_dir,
        logs_dir,
    })
}
