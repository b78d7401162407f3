use anyhow::Result;

use scaffold_config::Scope;

use crate::commands::{CommandReport, open_session, summary_line};

pub fn run(scope: Scope, limit: Option<usize>) -> Result<CommandReport> {
    let mut report = CommandReport::new("list");
    if limit.is_some() && scope != Scope::History {
        report.issue(format!("--limit only applies to history, not {scope}"));
        return Ok(report);
    }
    let session = open_session()?;

    let limit = match scope {
        Scope::History => Some(limit.unwrap_or(session.config.history.list_limit)),
        Scope::System | Scope::Template => None,
    };
    let docs = session.store.scope(scope).list(limit)?;
    report.detail(format!("scope={scope} count={}", docs.len()));
    for doc in &docs {
        report.detail(summary_line(doc));
    }
    Ok(report)
}
