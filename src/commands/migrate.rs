use anyhow::Result;
use std::path::PathBuf;

use scaffold_config::Migrator;
use scaffold_config::store::config::load_config;
use scaffold_config::store::migrate::ItemStatus;
use scaffold_config::store::paths::resolve_paths;

use crate::commands::CommandReport;

pub fn run(legacy_dir: Option<PathBuf>) -> Result<CommandReport> {
    let mut report = CommandReport::new("migrate");
    let mut paths = resolve_paths()?;
    if let Some(dir) = legacy_dir {
        paths = paths.with_legacy_dir(dir);
    }
    let config = load_config(&paths)?;

    let migrator = Migrator::new(paths, &config);
    report.detail(format!("legacy_dir={}", migrator.paths().legacy_dir.display()));
    let result = migrator.migrate_all()?;

    report.detail(format!("phase={}", result.phase.as_str()));
    report.detail(format!("backup={}", result.backup_path.display()));
    report.detail(format!("backed_up_files={}", result.backed_up_files));
    if let Some(path) = &result.report_path {
        report.detail(format!("report={}", path.display()));
    }
    for (label, items) in [
        ("template", &result.migrated_templates),
        ("history", &result.migrated_histories),
    ] {
        for item in items {
            let target = item.target_id.as_deref().unwrap_or("-");
            match item.status {
                ItemStatus::Success => {
                    report.detail(format!("{label} {} -> {target}", item.source_file))
                }
                status => report.issue(format!(
                    "{label} {} {}: {}",
                    item.source_file,
                    status.as_str(),
                    item.error.as_deref().unwrap_or("unknown error")
                )),
            }
        }
    }
    for err in &result.errors {
        report.issue(err.clone());
    }
    if !result.success && report.issues.is_empty() {
        report.issue("migration did not complete");
    }
    Ok(report)
}
