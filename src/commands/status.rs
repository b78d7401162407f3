use anyhow::Result;
use std::env;

use scaffold_config::Scope;

use crate::commands::{CommandReport, open_session};

mod generated {
    include!(concat!(env!("OUT_DIR"), "/scaffold_env_allowlist.rs"));
}

pub use generated::GENERATED_ENV_ALLOWLIST;

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    report.detail(format!("build_id={}", env!("BUILD_ID")));

    let session = open_session()?;
    let paths = &session.paths;
    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("store_root={}", paths.store_root.display()));
    report.detail(format!("legacy_dir={}", paths.legacy_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!(
        "history.list_limit={}",
        session.config.history.list_limit
    ));
    report.detail(format!(
        "history.disambiguate_collisions={}",
        session.config.history.disambiguate_collisions
    ));
    report.detail(format!(
        "migration.backup_dir_name={}",
        session.config.migration.backup_dir_name
    ));

    for scope in Scope::ALL {
        match session.store.scope(scope).list(None) {
            Ok(docs) => report.detail(format!("{}.documents={}", scope.as_str(), docs.len())),
            Err(err) => report.issue(format!("failed to list {scope}: {err}")),
        }
    }

    for key in GENERATED_ENV_ALLOWLIST {
        if let Ok(value) = env::var(key) {
            report.detail(format!("env {key}={value}"));
        }
    }

    Ok(report)
}
