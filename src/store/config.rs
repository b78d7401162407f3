use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::paths::StorePaths;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryConfig {
    pub list_limit: usize,
    #[serde(default = "default_disambiguate_collisions")]
    pub disambiguate_collisions: bool,
}

fn default_disambiguate_collisions() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            list_limit: 50,
            disambiguate_collisions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrationConfig {
    pub backup_dir_name: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            backup_dir_name: "backup".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub history: HistoryConfig,
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialStoreConfig {
    history: Option<HistoryConfig>,
    migration: Option<MigrationConfig>,
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

pub fn validate(cfg: &StoreConfig) -> Result<()> {
    if cfg.history.list_limit == 0 {
        return Err(anyhow!("invalid history list limit: must be >= 1"));
    }
    let name = cfg.migration.backup_dir_name.trim();
    if name.is_empty() {
        return Err(anyhow!("invalid backup dir name: cannot be empty"));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(anyhow!(
            "invalid backup dir name `{name}`: must be a single path component"
        ));
    }
    Ok(())
}

fn resolve_config_path(paths: &StorePaths) -> PathBuf {
    if let Ok(custom) = env::var("SCAFFOLD_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    paths.home.join("scaffold.toml")
}

fn merge_file_config(base: &mut StoreConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialStoreConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse store config {}: {err}", path.display()))?;
    if let Some(history) = parsed.history {
        base.history = history;
    }
    if let Some(migration) = parsed.migration {
        base.migration = migration;
    }
    Ok(())
}

pub fn load_config_from(path: &Path) -> Result<StoreConfig> {
    let mut cfg = StoreConfig::default();
    merge_file_config(&mut cfg, path)?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_config(paths: &StorePaths) -> Result<StoreConfig> {
    let mut cfg = StoreConfig::default();
    merge_file_config(&mut cfg, &resolve_config_path(paths))?;

    cfg.history.list_limit = env_or_usize("SCAFFOLD_HISTORY_LIST_LIMIT", cfg.history.list_limit);
    cfg.history.disambiguate_collisions = env_or_bool(
        "SCAFFOLD_HISTORY_DISAMBIGUATE",
        cfg.history.disambiguate_collisions,
    );
    cfg.migration.backup_dir_name =
        env_or_string("SCAFFOLD_BACKUP_DIR_NAME", &cfg.migration.backup_dir_name);

    validate(&cfg)?;
    Ok(cfg)
}
