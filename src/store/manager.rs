use serde_json::{Value, json};

use crate::error::{StoreError, StoreResult};
use crate::store::codec::{Metadata, Payload};
use crate::store::config::StoreConfig;
use crate::store::document::{ConfigDocument, SYSTEM_ID, Scope};
use crate::store::paths::StorePaths;
use crate::store::scoped::ScopedStore;
use crate::store::search::{self, SearchFilter, SearchResults};

pub const DEFAULT_APP_NAME: &str = "Spring Boot Project Generator";

/// The three scoped collections under one root.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    paths: StorePaths,
    system: ScopedStore,
    templates: ScopedStore,
    history: ScopedStore,
}

impl ConfigStore {
    pub fn open(paths: StorePaths, config: &StoreConfig) -> StoreResult<Self> {
        let system = ScopedStore::open(Scope::System, paths.scope_dir(Scope::System))?;
        let templates = ScopedStore::open(Scope::Template, paths.scope_dir(Scope::Template))?;
        let history = ScopedStore::open(Scope::History, paths.scope_dir(Scope::History))?
            .with_collision_suffix(config.history.disambiguate_collisions);
        Ok(Self {
            paths,
            system,
            templates,
            history,
        })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn system(&self) -> &ScopedStore {
        &self.system
    }

    pub fn templates(&self) -> &ScopedStore {
        &self.templates
    }

    pub fn history(&self) -> &ScopedStore {
        &self.history
    }

    pub fn scope(&self, scope: Scope) -> &ScopedStore {
        match scope {
            Scope::System => &self.system,
            Scope::Template => &self.templates,
            Scope::History => &self.history,
        }
    }

    /// The system settings document, written with defaults on first access.
    pub fn load_system(&self) -> StoreResult<ConfigDocument> {
        match self.system.load_document(SYSTEM_ID) {
            Ok(doc) => Ok(doc),
            Err(StoreError::NotFound { .. }) => {
                self.system.save_if_revision(
                    SYSTEM_ID,
                    &default_system_payload(),
                    &default_system_metadata(),
                    0,
                )?;
                self.system.load_document(SYSTEM_ID)
            }
            Err(err) => Err(err),
        }
    }

    pub fn search(&self, keyword: &str, filter: SearchFilter) -> StoreResult<SearchResults> {
        search::search(&self.templates, &self.history, keyword, filter)
    }
}

pub fn default_system_metadata() -> Metadata {
    Metadata {
        name: Some(DEFAULT_APP_NAME.to_string()),
        version: Some("1.0.0".to_string()),
        description: Some("Shared settings for the project generator".to_string()),
        ..Metadata::default()
    }
}

pub fn default_system_payload() -> Payload {
    let value = json!({
        "app_name": DEFAULT_APP_NAME,
        "output": {
            "default_dir": "./output",
            "backup_dir": "./backup",
            "temp_dir": "./temp"
        },
        "templates": {
            "base_path": "./templates",
            "cache_enabled": true,
            "cache_ttl": 3600
        },
        "logging": {
            "level": "INFO",
            "file": "./logs/generator.log",
            "max_size": "10MB",
            "backup_count": 5
        },
        "generator": {
            "max_concurrent_tasks": 4,
            "timeout_seconds": 300,
            "auto_backup": true
        },
        "ui": {
            "theme": "default",
            "language": "en-US",
            "show_progress": true
        },
        "validation": {
            "strict_mode": false,
            "check_dependencies": true,
            "validate_package_name": true
        }
    });
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(root: &std::path::Path) -> ConfigStore {
        ConfigStore::open(StorePaths::under(root), &StoreConfig::default()).expect("open")
    }

    #[test]
    fn open_creates_scope_directories() {
        let tmp = tempdir().expect("tempdir");
        let store = open(tmp.path());
        for scope in Scope::ALL {
            assert!(store.scope(scope).dir().is_dir(), "{scope} dir missing");
        }
        // Reopening an existing layout is harmless.
        open(tmp.path());
    }

    #[test]
    fn load_system_writes_defaults_once() {
        let tmp = tempdir().expect("tempdir");
        let store = open(tmp.path());

        let first = store.load_system().expect("first");
        assert_eq!(first.metadata.revision, Some(1));
        assert_eq!(
            first.payload.get("app_name").and_then(Value::as_str),
            Some(DEFAULT_APP_NAME)
        );

        let second = store.load_system().expect("second");
        assert_eq!(second.metadata.revision, Some(1));
        assert_eq!(second.payload, first.payload);
    }
}
