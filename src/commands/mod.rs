pub mod delete;
pub mod list;
pub mod migrate;
pub mod rollback;
pub mod search;
pub mod show;
pub mod status;
pub mod transfer;

use anyhow::Result;
use serde::Serialize;

use scaffold_config::ConfigStore;
use scaffold_config::store::config::{StoreConfig, load_config};
use scaffold_config::store::document::DocumentSummary;
use scaffold_config::store::paths::{StorePaths, resolve_paths};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

pub struct Session {
    pub paths: StorePaths,
    pub config: StoreConfig,
    pub store: ConfigStore,
}

/// Resolve paths and tunables from the environment and open the store.
pub fn open_session() -> Result<Session> {
    let paths = resolve_paths()?;
    let config = load_config(&paths)?;
    let store = ConfigStore::open(paths.clone(), &config)?;
    Ok(Session {
        paths,
        config,
        store,
    })
}

pub fn summary_line(summary: &DocumentSummary) -> String {
    format!(
        "{} name={} created_at={}",
        summary.id,
        summary.display_name(),
        summary.created_at()
    )
}
