use std::fmt::Write;

use crate::store::document::Scope;
use crate::store::migrate::{MigrationItem, MigrationResult};
use crate::store::paths::StorePaths;
use crate::store::util::now_display_stamp;

fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

fn push_table(out: &mut String, title: &str, items: &[MigrationItem]) {
    let _ = writeln!(out, "## {title}\n");
    if items.is_empty() {
        out.push_str("_none_\n\n");
        return;
    }
    out.push_str("| Source | Target ID | Status | Error |\n");
    out.push_str("|---|---|---|---|\n");
    for item in items {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            cell(&item.source_file),
            cell(item.target_id.as_deref().unwrap_or("-")),
            item.status.as_str(),
            cell(item.error.as_deref().unwrap_or("-")),
        );
    }
    out.push('\n');
}

/// Markdown summary of a run, written into the backup directory.
pub fn render(result: &MigrationResult, paths: &StorePaths) -> String {
    let mut out = String::new();
    out.push_str("# Configuration Migration Report\n\n");

    out.push_str("## Overview\n\n");
    let _ = writeln!(out, "- **Generated At**: {}", now_display_stamp());
    let _ = writeln!(
        out,
        "- **Status**: {}",
        if result.success { "success" } else { "failed" }
    );
    let _ = writeln!(out, "- **Phase**: {}", result.phase.as_str());
    let _ = writeln!(out, "- **Backup Path**: {}", result.backup_path.display());
    let _ = writeln!(out, "- **Backed Up Files**: {}", result.backed_up_files);
    let _ = writeln!(out, "- **Templates**: {}", result.migrated_templates.len());
    let _ = writeln!(out, "- **Histories**: {}", result.migrated_histories.len());
    out.push('\n');

    push_table(&mut out, "Templates", &result.migrated_templates);
    push_table(&mut out, "Histories", &result.migrated_histories);

    out.push_str("## Errors\n\n");
    if result.errors.is_empty() {
        out.push_str("_none_\n\n");
    } else {
        for err in &result.errors {
            let _ = writeln!(out, "- {}", err.replace('\n', " "));
        }
        out.push('\n');
    }

    out.push_str("## Layout\n\n```text\n");
    let _ = writeln!(out, "{}/", paths.store_root.display());
    for scope in Scope::ALL {
        let _ = writeln!(out, "  {}/", scope.dir_name());
    }
    let _ = writeln!(out, "{}/", result.backup_path.display());
    out.push_str("```\n");
    out
}
