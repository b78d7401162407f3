use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use scaffold_config::{Scope, SearchFilter};

use crate::commands::{self, CommandReport};

#[derive(Parser, Debug)]
#[command(
    name = "scaffold-config",
    version,
    about = "Inspect, migrate and roll back project generator configuration"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show resolved paths, tunables and document counts.
    Status,
    /// List documents of one scope, newest first.
    List {
        scope: Scope,
        #[arg(long)]
        limit: Option<usize>,
    },
    Show {
        scope: Scope,
        id: String,
    },
    /// Case-insensitive keyword search over templates and history.
    Search {
        keyword: String,
        #[arg(long, default_value = "all")]
        scope: SearchFilter,
    },
    Delete {
        scope: Scope,
        id: String,
    },
    Export {
        scope: Scope,
        id: String,
        destination: PathBuf,
    },
    Import {
        scope: Scope,
        source: PathBuf,
    },
    /// Convert the legacy flat-JSON collection into the scoped store.
    Migrate {
        #[arg(long)]
        legacy_dir: Option<PathBuf>,
    },
    /// Remove every scope directory and restore legacy files from a backup.
    Rollback {
        #[arg(long)]
        backup_dir: PathBuf,
    },
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let status = if report.ok { "ok" } else { "failed" };
    println!("{}: {status}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Status => commands::status::run()?,
        Command::List { scope, limit } => commands::list::run(scope, limit)?,
        Command::Show { scope, id } => commands::show::run(scope, &id)?,
        Command::Search { keyword, scope } => commands::search::run(&keyword, scope)?,
        Command::Delete { scope, id } => commands::delete::run(scope, &id)?,
        Command::Export {
            scope,
            id,
            destination,
        } => commands::transfer::export(scope, &id, &destination)?,
        Command::Import { scope, source } => commands::transfer::import(scope, &source)?,
        Command::Migrate { legacy_dir } => commands::migrate::run(legacy_dir)?,
        Command::Rollback { backup_dir } => commands::rollback::run(&backup_dir)?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
