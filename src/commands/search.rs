use anyhow::Result;

use scaffold_config::SearchFilter;

use crate::commands::{CommandReport, open_session, summary_line};

pub fn run(keyword: &str, filter: SearchFilter) -> Result<CommandReport> {
    let mut report = CommandReport::new("search");
    let session = open_session()?;

    let results = session.store.search(keyword, filter)?;
    report.detail(format!(
        "keyword={keyword} scope={filter} matches={}",
        results.total()
    ));
    for doc in &results.templates {
        report.detail(format!("template {}", summary_line(doc)));
    }
    for doc in &results.histories {
        report.detail(format!("history {}", summary_line(doc)));
    }
    Ok(report)
}
