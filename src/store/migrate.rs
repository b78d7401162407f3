//! Bulk conversion of the legacy flat-JSON collection into the scoped store.
//!
//! A run is linear: `Backup` copies every legacy `*.json` into a fresh
//! timestamped directory and verifies it, then each file is classified,
//! reshaped and saved, and finally `migration_report.md` is written next to
//! the backup. Item failures are recorded and the batch carries on. Only a
//! failure while backing up ends the run early, in `Failed`.
//!
//! [`Migrator::try_rollback`] is destructive: it removes the three scope
//! directories wholesale, including documents saved after the migration.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::audit;
use crate::store::config::StoreConfig;
use crate::store::document::Scope;
use crate::store::legacy;
use crate::store::manager::ConfigStore;
use crate::store::paths::StorePaths;
use crate::store::report;
use crate::store::util::{file_hash, now_backup_stamp};
use crate::store::warn::{self, WarnEvent};

pub const REPORT_FILE_NAME: &str = "migration_report.md";
const LEGACY_EXT: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    Idle,
    Backup,
    ClassifyAndTransform,
    Persist,
    ReportGenerated,
    Failed,
}

impl MigrationPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationPhase::Idle => "idle",
            MigrationPhase::Backup => "backup",
            MigrationPhase::ClassifyAndTransform => "classify_and_transform",
            MigrationPhase::Persist => "persist",
            MigrationPhase::ReportGenerated => "report_generated",
            MigrationPhase::Failed => "failed",
        }
    }
}

/// Per-file outcome. `Error` means the legacy file could not be read or
/// reshaped; `Failed` means the new document could not be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Failed,
    Error,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Success => "success",
            ItemStatus::Failed => "failed",
            ItemStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationItem {
    pub source_file: String,
    pub target_id: Option<String>,
    pub status: ItemStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    pub phase: MigrationPhase,
    pub migrated_templates: Vec<MigrationItem>,
    pub migrated_histories: Vec<MigrationItem>,
    pub errors: Vec<String>,
    pub backup_path: PathBuf,
    pub backed_up_files: usize,
    pub report_path: Option<PathBuf>,
}

impl MigrationResult {
    fn new(backup_path: PathBuf) -> Self {
        Self {
            success: false,
            phase: MigrationPhase::Idle,
            migrated_templates: Vec::new(),
            migrated_histories: Vec::new(),
            errors: Vec::new(),
            backup_path,
            backed_up_files: 0,
            report_path: None,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &MigrationItem> {
        self.migrated_templates
            .iter()
            .chain(self.migrated_histories.iter())
    }

    pub fn count_with(&self, status: ItemStatus) -> usize {
        self.items().filter(|item| item.status == status).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub removed_dirs: Vec<PathBuf>,
    pub restored_files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Migrator {
    paths: StorePaths,
    config: StoreConfig,
    backup_dir: PathBuf,
}

impl Migrator {
    /// Picks a backup directory `<legacy>/<backup_dir_name>/<stamp>` that
    /// does not exist yet. Nothing is created until [`Self::migrate_all`].
    pub fn new(paths: StorePaths, config: &StoreConfig) -> Self {
        let parent = paths.legacy_dir.join(&config.migration.backup_dir_name);
        let backup_dir = unique_dir(&parent, &now_backup_stamp());
        Self {
            paths,
            config: config.clone(),
            backup_dir,
        }
    }

    /// Point at an existing backup, for rollback.
    pub fn with_backup_dir(mut self, backup_dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = backup_dir.into();
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Run the whole pipeline. Errors are returned only when the audit log
    /// cannot be written, and only after the report is on disk; everything
    /// else lands in the result.
    pub fn migrate_all(&self) -> Result<MigrationResult> {
        let mut result = MigrationResult::new(self.backup_dir.clone());
        let mut audit = RunAudit::new(&self.paths);
        audit.record(
            "migration",
            "started",
            &format!("legacy_dir={}", self.paths.legacy_dir.display()),
        );

        result.phase = MigrationPhase::Backup;
        let sources = match self.backup() {
            Ok(sources) => sources,
            Err(err) => {
                let message = format!("backup failed: {err:#}");
                warn::emit(WarnEvent {
                    code: "MIGRATION_BACKUP_FAILED",
                    stage: "migration",
                    action: "backup",
                    scope: "legacy",
                    id: "na",
                    path: &self.backup_dir.display().to_string(),
                    reason: "backup-incomplete",
                    err: &format!("{err:#}"),
                });
                result.errors.push(message.clone());
                result.phase = MigrationPhase::Failed;
                if self.backup_dir.is_dir() {
                    self.write_report(&mut result);
                }
                audit.record("backup", "failed", &message);
                return audit.finish().map(|()| result);
            }
        };
        result.backed_up_files = sources.len();
        audit.record(
            "backup",
            "ok",
            &format!(
                "files={} dir={}",
                sources.len(),
                self.backup_dir.display()
            ),
        );

        let store = match ConfigStore::open(self.paths.clone(), &self.config) {
            Ok(store) => store,
            Err(err) => {
                let message = format!("failed to open target store: {err}");
                result.errors.push(message.clone());
                result.phase = MigrationPhase::Failed;
                self.write_report(&mut result);
                audit.record("persist", "failed", &message);
                return audit.finish().map(|()| result);
            }
        };
        if let Err(err) = store.load_system() {
            result
                .errors
                .push(format!("failed to initialize system settings: {err}"));
        }

        result.phase = MigrationPhase::ClassifyAndTransform;
        for source in &sources {
            let scope = source
                .file_name()
                .and_then(|s| s.to_str())
                .map(legacy::classify)
                .unwrap_or(Scope::History);
            let item = self.migrate_one(&store, source, scope);
            if item.status != ItemStatus::Success {
                warn::emit(WarnEvent {
                    code: "MIGRATION_ITEM_FAILED",
                    stage: "migration",
                    action: "persist",
                    scope: scope.as_str(),
                    id: item.target_id.as_deref().unwrap_or("na"),
                    path: &source.display().to_string(),
                    reason: item.status.as_str(),
                    err: item.error.as_deref().unwrap_or("na"),
                });
            }
            match scope {
                Scope::Template => result.migrated_templates.push(item),
                Scope::System | Scope::History => result.migrated_histories.push(item),
            }
        }
        result.phase = MigrationPhase::Persist;
        audit.record(
            "persist",
            "ok",
            &format!(
                "templates={} histories={} failed={}",
                result.migrated_templates.len(),
                result.migrated_histories.len(),
                result.count_with(ItemStatus::Failed) + result.count_with(ItemStatus::Error)
            ),
        );

        result.success = result.errors.is_empty()
            && result.items().all(|item| item.status == ItemStatus::Success);
        self.write_report(&mut result);
        if result.report_path.is_some() {
            result.phase = MigrationPhase::ReportGenerated;
        } else {
            result.success = false;
            result.phase = MigrationPhase::Failed;
        }
        audit.record(
            "migration",
            if result.success { "ok" } else { "partial" },
            &format!("phase={}", result.phase.as_str()),
        );
        audit.finish().map(|()| result)
    }

    fn migrate_one(&self, store: &ConfigStore, source: &Path, scope: Scope) -> MigrationItem {
        let source_file = source
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let cfg = match legacy::read_legacy(source) {
            Ok(cfg) => cfg,
            Err(err) => {
                return MigrationItem {
                    source_file,
                    target_id: None,
                    status: ItemStatus::Error,
                    error: Some(err.to_string()),
                };
            }
        };

        let (key, metadata) = match scope {
            Scope::Template => (cfg.template_id(), cfg.template_metadata()),
            Scope::System | Scope::History => (cfg.stem.clone(), cfg.history_metadata()),
        };
        match store
            .scope(scope)
            .save(&key, &cfg.to_payload(), &metadata)
        {
            Ok(saved) => MigrationItem {
                source_file,
                target_id: Some(saved.id),
                status: ItemStatus::Success,
                error: None,
            },
            Err(err) => MigrationItem {
                source_file,
                target_id: Some(key),
                status: ItemStatus::Failed,
                error: Some(err.to_string()),
            },
        }
    }

    /// Copy every top-level legacy file into the backup directory and check
    /// each copy's SHA-256 against its source.
    fn backup(&self) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.backup_dir)
            .with_context(|| format!("failed to create {}", self.backup_dir.display()))?;

        let sources = legacy_files(&self.paths.legacy_dir)?;
        for source in &sources {
            let Some(name) = source.file_name() else {
                continue;
            };
            let target = self.backup_dir.join(name);
            fs::copy(source, &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    source.display(),
                    target.display()
                )
            })?;
            if file_hash(source)? != file_hash(&target)? {
                return Err(anyhow!(
                    "backup copy {} does not match its source",
                    target.display()
                ));
            }
        }
        Ok(sources)
    }

    fn write_report(&self, result: &mut MigrationResult) {
        let text = report::render(result, &self.paths);
        let path = self.backup_dir.join(REPORT_FILE_NAME);
        match fs::write(&path, text) {
            Ok(()) => result.report_path = Some(path),
            Err(err) => {
                warn::emit(WarnEvent {
                    code: "MIGRATION_REPORT_FAILED",
                    stage: "migration",
                    action: "write-report",
                    scope: "legacy",
                    id: REPORT_FILE_NAME,
                    path: &path.display().to_string(),
                    reason: "write-failed",
                    err: &err.to_string(),
                });
                result
                    .errors
                    .push(format!("failed to write report {}: {err}", path.display()));
            }
        }
    }

    /// Delete the system, template and history directories, then copy the
    /// backed-up legacy `*.json` files back into the legacy directory.
    pub fn try_rollback(&self) -> Result<RollbackOutcome> {
        if !self.backup_dir.is_dir() {
            return Err(anyhow!(
                "backup directory {} does not exist",
                self.backup_dir.display()
            ));
        }

        let mut outcome = RollbackOutcome::default();
        for scope in Scope::ALL {
            let dir = self.paths.scope_dir(scope);
            if dir.exists() {
                fs::remove_dir_all(&dir)
                    .with_context(|| format!("failed to remove {}", dir.display()))?;
                outcome.removed_dirs.push(dir);
            }
        }

        fs::create_dir_all(&self.paths.legacy_dir)
            .with_context(|| format!("failed to create {}", self.paths.legacy_dir.display()))?;
        for backup in legacy_files(&self.backup_dir)? {
            let Some(name) = backup.file_name() else {
                continue;
            };
            let target = self.paths.legacy_dir.join(name);
            fs::copy(&backup, &target).with_context(|| {
                format!(
                    "failed to restore {} to {}",
                    backup.display(),
                    target.display()
                )
            })?;
            outcome.restored_files.push(target);
        }

        audit::append_event(
            &self.paths,
            "rollback",
            "ok",
            &format!(
                "removed_dirs={} restored_files={} backup={}",
                outcome.removed_dirs.len(),
                outcome.restored_files.len(),
                self.backup_dir.display()
            ),
        )?;
        Ok(outcome)
    }

    pub fn rollback(&self) -> bool {
        match self.try_rollback() {
            Ok(_) => true,
            Err(err) => {
                warn::emit(WarnEvent {
                    code: "ROLLBACK_FAILED",
                    stage: "rollback",
                    action: "restore",
                    scope: "legacy",
                    id: "na",
                    path: &self.backup_dir.display().to_string(),
                    reason: "rollback-aborted",
                    err: &format!("{err:#}"),
                });
                if let Err(audit_err) =
                    audit::append_event(&self.paths, "rollback", "failed", &format!("{err:#}"))
                {
                    warn_audit_failed(&self.paths, "rollback", &audit_err);
                }
                false
            }
        }
    }
}

/// Audit appends for one run. The first failure is held back so the run
/// can still persist items and write its report.
struct RunAudit<'a> {
    paths: &'a StorePaths,
    first_err: Option<anyhow::Error>,
}

impl<'a> RunAudit<'a> {
    fn new(paths: &'a StorePaths) -> Self {
        Self {
            paths,
            first_err: None,
        }
    }

    fn record(&mut self, phase: &str, status: &str, message: &str) {
        if let Err(err) = audit::append_event(self.paths, phase, status, message) {
            warn_audit_failed(self.paths, phase, &err);
            self.first_err.get_or_insert(err);
        }
    }

    fn finish(self) -> Result<()> {
        match self.first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn warn_audit_failed(paths: &StorePaths, phase: &str, err: &anyhow::Error) {
    warn::emit(WarnEvent {
        code: "AUDIT_WRITE_FAILED",
        stage: phase,
        action: "append-audit",
        scope: "audit",
        id: "na",
        path: &paths.audit_log().display().to_string(),
        reason: "write-failed",
        err: &format!("{err:#}"),
    });
}

/// Top-level `*.json` files of `dir`, sorted by name. A missing directory
/// is an empty collection.
fn legacy_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", dir.display()));
        }
    };

    let mut out = Vec::new();
    for entry in read_dir {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", dir.display()))?
            .path();
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(LEGACY_EXT));
        if path.is_file() && is_json {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn unique_dir(parent: &Path, stamp: &str) -> PathBuf {
    let first = parent.join(stamp);
    if !first.exists() {
        return first;
    }
    let mut n = 2usize;
    loop {
        let candidate = parent.join(format!("{stamp}_{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::tempdir;

    fn migrator(root: &Path) -> Migrator {
        Migrator::new(StorePaths::under(root), &StoreConfig::default())
    }

    #[test]
    fn backup_dir_is_unique_per_run() {
        let tmp = tempdir().expect("tempdir");
        let first = migrator(tmp.path());
        fs::create_dir_all(first.backup_dir()).expect("mkdir");
        let second = migrator(tmp.path());
        assert_ne!(first.backup_dir(), second.backup_dir());
        assert!(second.backup_dir().starts_with(tmp.path().join("backup")));
    }

    #[test]
    fn unparseable_file_is_an_item_error_and_batch_continues() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("broken.json"), "{ nope").expect("write");
        fs::write(
            tmp.path().join("good.json"),
            r#"{"project_name": "good", "tech_stack": {"database": "postgresql"}}"#,
        )
        .expect("write");
        fs::write(tmp.path().join("notes.txt"), "ignored").expect("write");

        let result = migrator(tmp.path()).migrate_all().expect("migrate");
        assert!(!result.success);
        assert_eq!(result.phase, MigrationPhase::ReportGenerated);
        assert_eq!(result.backed_up_files, 2);
        assert_eq!(result.count_with(ItemStatus::Error), 1);
        assert_eq!(result.count_with(ItemStatus::Success), 1);

        let good = result
            .migrated_histories
            .iter()
            .find(|item| item.source_file == "good.json")
            .expect("good item");
        let id = good.target_id.as_deref().expect("id");
        let store = ConfigStore::open(StorePaths::under(tmp.path()), &StoreConfig::default())
            .expect("open");
        let payload = store.history().load(id).expect("load");
        assert_eq!(
            payload["tech_stack"]["database"],
            Value::String("postgresql".to_string())
        );
    }

    #[test]
    fn migration_writes_system_defaults_and_audit_trail() {
        let tmp = tempdir().expect("tempdir");
        let m = migrator(tmp.path());
        m.migrate_all().expect("migrate");

        assert!(StorePaths::under(tmp.path()).scope_dir(Scope::System).join("system.md").is_file());
        let events = audit::read_events(m.paths()).expect("events");
        let phases: Vec<_> = events.iter().map(|e| e.phase.as_str()).collect();
        assert_eq!(phases, vec!["migration", "backup", "persist", "migration"]);
    }

    #[test]
    fn unwritable_target_is_a_failed_item_in_the_report() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("default_template.json"), "{}").expect("write");
        fs::write(tmp.path().join("acme.json"), r#"{"project_name": "acme"}"#).expect("write");
        let templates = StorePaths::under(tmp.path()).scope_dir(Scope::Template);
        fs::create_dir_all(templates.join("spring-boot-basic.md")).expect("mkdir blocker");

        let result = migrator(tmp.path()).migrate_all().expect("migrate");
        assert!(!result.success);
        assert_eq!(result.phase, MigrationPhase::ReportGenerated);

        let template = &result.migrated_templates[0];
        assert_eq!(template.status, ItemStatus::Failed);
        assert_eq!(template.target_id.as_deref(), Some("spring-boot-basic"));
        assert!(template.error.is_some());
        assert_eq!(result.migrated_histories[0].status, ItemStatus::Success);
        assert_eq!(result.count_with(ItemStatus::Failed), 1);

        let report_path = result.report_path.expect("report path");
        let text = fs::read_to_string(report_path).expect("read report");
        assert!(text.contains("| default_template.json | spring-boot-basic | failed |"));
        assert!(text.contains("| acme.json | acme-"));
    }

    #[test]
    fn audit_failure_still_persists_and_writes_report() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("acme.json"), r#"{"project_name": "acme"}"#).expect("write");
        fs::write(tmp.path().join("logs"), "not a directory").expect("write blocker");
        let m = migrator(tmp.path());

        assert!(m.migrate_all().is_err());
        assert!(m.backup_dir().join(REPORT_FILE_NAME).is_file());
        assert!(m.backup_dir().join("acme.json").is_file());
        let histories = fs::read_dir(m.paths().scope_dir(Scope::History))
            .expect("history dir")
            .count();
        assert_eq!(histories, 1);
    }

    #[test]
    fn rollback_without_backup_reports_false() {
        let tmp = tempdir().expect("tempdir");
        let m = migrator(tmp.path()).with_backup_dir(tmp.path().join("missing"));
        assert!(m.try_rollback().is_err());
        assert!(!m.rollback());
    }

    #[test]
    fn rollback_skips_report_file() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("acme.json"), r#"{"project_name": "acme"}"#).expect("write");
        let m = migrator(tmp.path());
        let result = m.migrate_all().expect("migrate");
        assert!(result.report_path.is_some());

        let outcome = m.try_rollback().expect("rollback");
        assert_eq!(outcome.restored_files, vec![tmp.path().join("acme.json")]);
        assert!(!tmp.path().join(REPORT_FILE_NAME).exists());
        assert_eq!(outcome.removed_dirs.len(), 3);
    }
}
