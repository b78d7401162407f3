use anyhow::Result;
use std::path::Path;

use scaffold_config::{Scope, StoreError};

use crate::commands::{CommandReport, open_session};

pub fn export(scope: Scope, id: &str, destination: &Path) -> Result<CommandReport> {
    let mut report = CommandReport::new("export");
    let session = open_session()?;

    match session.store.scope(scope).export(id, destination) {
        Ok(written) => report.detail(format!("exported {scope} {id} to {}", written.display())),
        Err(err @ StoreError::NotFound { .. }) => report.issue(err.to_string()),
        Err(err) => return Err(err.into()),
    }
    Ok(report)
}

pub fn import(scope: Scope, source: &Path) -> Result<CommandReport> {
    let mut report = CommandReport::new("import");
    let session = open_session()?;

    match session.store.scope(scope).import(source) {
        Ok(saved) => report.detail(format!(
            "imported {} as {scope} {} at {}",
            source.display(),
            saved.id,
            saved.path.display()
        )),
        Err(err) if err.is_not_found() => report.issue(err.to_string()),
        Err(err) => return Err(err.into()),
    }
    Ok(report)
}
