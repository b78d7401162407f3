use anyhow::Result;

use scaffold_config::{Scope, StoreError};

use crate::commands::{CommandReport, open_session};

pub fn run(scope: Scope, id: &str) -> Result<CommandReport> {
    let mut report = CommandReport::new("show");
    let session = open_session()?;

    let doc = match session.store.scope(scope).load_document(id) {
        Ok(doc) => doc,
        Err(err @ StoreError::NotFound { .. }) => {
            report.issue(err.to_string());
            return Ok(report);
        }
        Err(err) => return Err(err.into()),
    };

    report.detail(format!("id={}", doc.id));
    report.detail(format!("path={}", doc.path.display()));
    report.detail(format!("metadata={}", serde_json::to_string(&doc.metadata)?));
    report.detail(format!("payload={}", serde_json::to_string(&doc.payload)?));
    for skipped in &doc.skipped {
        report.detail(format!(
            "skipped line={} block={} reason={}",
            skipped.line, skipped.what, skipped.reason
        ));
    }
    Ok(report)
}
