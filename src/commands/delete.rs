use anyhow::Result;

use scaffold_config::Scope;

use crate::commands::{CommandReport, open_session};

pub fn run(scope: Scope, id: &str) -> Result<CommandReport> {
    let mut report = CommandReport::new("delete");
    let session = open_session()?;

    if session.store.scope(scope).delete(id)? {
        report.detail(format!("deleted {scope} {id}"));
    } else {
        report.issue(format!("{scope} document `{id}` not found"));
    }
    Ok(report)
}
