use anyhow::Result;
use std::path::Path;

use scaffold_config::Migrator;
use scaffold_config::store::config::load_config;
use scaffold_config::store::paths::resolve_paths;

use crate::commands::CommandReport;

pub fn run(backup_dir: &Path) -> Result<CommandReport> {
    let mut report = CommandReport::new("rollback");
    let paths = resolve_paths()?;
    let config = load_config(&paths)?;

    let migrator = Migrator::new(paths, &config).with_backup_dir(backup_dir);
    match migrator.try_rollback() {
        Ok(outcome) => {
            for dir in &outcome.removed_dirs {
                report.detail(format!("removed {}", dir.display()));
            }
            for file in &outcome.restored_files {
                report.detail(format!("restored {}", file.display()));
            }
        }
        Err(err) => report.issue(format!("rollback failed: {err:#}")),
    }
    Ok(report)
}
