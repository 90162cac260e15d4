mod commands;
mod logging;
mod progress;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use archivist_core::config::{load_configuration, non_overlapping_directories};
use archivist_core::ingest::{remove_asset, RemovalMode};
use archivist_core::migration::backup;
use archivist_core::scanner::collect_import_files;
use archivist_core::{
    catalog, open_catalog, verify, AppConfig, Database, FileStatus, ImportPipeline, MediaCategory,
    MigrationOrchestrator, SchemaVersion, UpgradeOutcome, VerifyScope,
};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{
    BackupCommand, Cli, Commands, ImportArgs, LocationCommand, MigrateCommand, SubLocationCommand,
};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Location(cmd)) => run_location(&config, cmd),
        Some(Commands::SubLocation(cmd)) => run_sub_location(&config, cmd),
        Some(Commands::Import(import)) => run_import(&config, import),
        Some(Commands::Verify { location, batch }) => run_verify(&config, location, batch),
        Some(Commands::Migrate(cmd)) => run_migrate(&config, cmd),
        Some(Commands::Backup(cmd)) => run_backup(&config, cmd),
        Some(Commands::RemoveAsset {
            hash,
            tombstone,
            yes,
        }) => run_remove_asset(&config, &hash, tombstone, yes),
        Some(Commands::Link {
            hash,
            other,
            remove,
        }) => run_link(&config, &hash, other.as_deref(), remove),
        Some(Commands::Batches { limit }) => run_batches(&config, limit),
        Some(Commands::PrintConfig) => toml::to_string_pretty(&config)
            .map(|rendered| println!("{}", rendered))
            .context("rendering configuration"),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("{:#}", err);
        process::exit(1);
    }
}

fn open_db(config: &AppConfig) -> Result<Database> {
    open_catalog(config, &CliReporter::new()).with_context(|| {
        format!("opening catalog {}", config.catalog_path.display())
    })
}

/// Open the catalog as-is, without the automatic upgrade, for schema inspection.
fn open_db_unmigrated(config: &AppConfig) -> Result<Database> {
    if let Some(parent) = config.catalog_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(Database::open(&config.catalog_path)?)
}

fn run_location(config: &AppConfig, cmd: LocationCommand) -> Result<()> {
    let db = open_db(config)?;
    match cmd {
        LocationCommand::Add { name, region } => {
            let location =
                catalog::create_location(&db, &name, region.as_deref(), config.max_id_attempts)?;
            println!(
                "{} {} ({})",
                "Created location".green(),
                location.name.bold(),
                location.short_id.cyan()
            );
        }
        LocationCommand::List => {
            let locations = db.list_locations()?;
            if locations.is_empty() {
                println!("No locations yet");
            }
            for location in locations {
                let region = location.region.as_deref().unwrap_or("-");
                let mut assets = 0;
                for category in MediaCategory::ALL {
                    assets += db.count_assets(category, Some(&location.id))?;
                }
                println!(
                    "{}  {}  [{}]  {} assets",
                    location.short_id.cyan(),
                    location.name.bold(),
                    region,
                    assets
                );
                for sub in db.list_sub_locations(&location.id)? {
                    println!("    {}  {}", sub.short_id.cyan(), sub.name);
                }
                for url in db.list_archive_urls(&location.id)? {
                    println!("    {}  {}", url.short_id.cyan(), url.url.underline());
                }
            }
        }
        LocationCommand::AddUrl { location, url } => {
            let archive_url =
                catalog::create_archive_url(&db, &location, &url, config.max_id_attempts)?;
            println!("{} {}", "Added URL".green(), archive_url.short_id.cyan());
        }
    }
    Ok(())
}

fn run_sub_location(config: &AppConfig, cmd: SubLocationCommand) -> Result<()> {
    let db = open_db(config)?;
    match cmd {
        SubLocationCommand::Add { location, name } => {
            let sub = catalog::create_sub_location(&db, &location, &name, config.max_id_attempts)?;
            println!(
                "{} {} ({})",
                "Created sub-location".green(),
                sub.name.bold(),
                sub.short_id.cyan()
            );
        }
    }
    Ok(())
}

fn run_import(config: &AppConfig, args: ImportArgs) -> Result<()> {
    let db = open_db(config)?;
    let roots: Vec<PathBuf> = args
        .paths
        .iter()
        .map(|p| fs::canonicalize(p).with_context(|| format!("resolving {}", p.display())))
        .collect::<Result<_>>()?;
    let files = collect_import_files(&non_overlapping_directories(roots), &config.ignore_patterns)?;
    if files.is_empty() {
        warn!("Nothing to import");
        return Ok(());
    }
    info!("{} file(s) to import", files.len());

    let reporter = CliReporter::new();
    let summary = ImportPipeline::new(&db, config).submit_import(
        &args.location,
        args.sub_location.as_deref(),
        &files,
        &reporter,
    )?;
    let result = &summary.result;

    for outcome in &result.outcomes {
        match &outcome.status {
            FileStatus::Failed(reason) => {
                println!("  {} {}: {}", "failed".red(), outcome.source_path.display(), reason)
            }
            FileStatus::Duplicate(reason) => println!(
                "  {} {}: {}",
                "duplicate".yellow(),
                outcome.source_path.display(),
                reason
            ),
            FileStatus::Imported | FileStatus::Skipped => {}
        }
        for warning in &outcome.warnings {
            println!("  {} {}: {}", "warning".yellow(), outcome.source_path.display(), warning);
        }
    }

    println!();
    info!(
        "Batch {}: {} imported, {} duplicates, {} skipped, {} failed",
        result.batch_id.cyan(),
        format!("{}", result.imported).green(),
        format!("{}", result.duplicates).yellow(),
        result.skipped,
        format!("{}", result.failed).red(),
    );

    if !summary.verification.is_clean() {
        bail!(
            "post-import verification failed: {} mismatched, {} missing",
            summary.verification.mismatched.len(),
            summary.verification.missing.len()
        );
    }
    if result.failed > 0 {
        bail!("{} file(s) could not be imported", result.failed);
    }
    Ok(())
}

fn run_verify(config: &AppConfig, location: Option<String>, batch: Option<String>) -> Result<()> {
    let db = open_db(config)?;
    let scope = match (location, batch) {
        (Some(key), _) => {
            let location = db
                .find_location(&key)?
                .with_context(|| format!("location '{}' not found", key))?;
            VerifyScope::Location(location.id)
        }
        (None, Some(batch)) => VerifyScope::Batch(batch),
        (None, None) => VerifyScope::All,
    };

    let report = verify(&db, &config.archive_root, &scope, &CliReporter::new())?;
    for mismatch in &report.mismatched {
        println!(
            "  {} {} expected {} got {}",
            "mismatch".red(),
            mismatch.archive_path,
            mismatch.content_hash,
            mismatch
                .actual_hash
                .as_deref()
                .or(mismatch.detail.as_deref())
                .unwrap_or("-")
        );
    }
    for missing in &report.missing {
        println!("  {} {}", "missing".red(), missing.archive_path);
    }
    info!(
        "{} checked, {} ok, {} mismatched, {} missing",
        report.checked(),
        format!("{}", report.ok).green(),
        format!("{}", report.mismatched.len()).red(),
        format!("{}", report.missing.len()).red(),
    );

    if !report.is_clean() {
        bail!("archive does not match the catalog");
    }
    Ok(())
}

fn version_label(version: Option<SchemaVersion>) -> String {
    version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".to_string())
}

fn run_migrate(config: &AppConfig, cmd: MigrateCommand) -> Result<()> {
    let db = open_db_unmigrated(config)?;
    let mut orchestrator = MigrationOrchestrator::new(&db, &config.backups_dir);
    match cmd {
        MigrateCommand::Status => {
            let status = orchestrator.status()?;
            println!("Current: {}", version_label(status.current).bold());
            println!("Latest:  {}", status.latest);
            if status.pending.is_empty() {
                println!("{}", "Up to date".green());
            } else {
                let pending: Vec<String> = status.pending.iter().map(|v| v.to_string()).collect();
                println!("Pending: {}", pending.join(", ").yellow());
            }
            for issue in &status.issues {
                println!("{} {}", "issue:".red(), issue);
            }
            if !status.is_consistent() {
                bail!("catalog ledger is inconsistent");
            }
        }
        MigrateCommand::List => {
            for step in orchestrator.list_steps()? {
                let state = match &step.applied_at {
                    Some(at) => format!("applied {}", at).green(),
                    None => "pending".yellow(),
                };
                println!("{:>8}  {}  {}", step.version.to_string().bold(), step.description, state);
            }
        }
        MigrateCommand::Upgrade { to, no_backup } => {
            let target = to.map(|raw| raw.parse::<SchemaVersion>()).transpose()?;
            let outcome = orchestrator.upgrade(target, !no_backup, &CliReporter::new())?;
            match outcome {
                UpgradeOutcome::NoOp { current } => {
                    println!("Catalog already at {}; nothing to do", version_label(current));
                }
                UpgradeOutcome::Upgraded { applied, snapshots } => {
                    for snapshot in &snapshots {
                        println!("  {} snapshot {}", "✓".green(), snapshot.path);
                    }
                    let applied: Vec<String> = applied.iter().map(|v| v.to_string()).collect();
                    println!("{} {}", "Applied".green(), applied.join(", "));
                }
            }
        }
    }
    Ok(())
}

fn run_backup(config: &AppConfig, cmd: BackupCommand) -> Result<()> {
    match cmd {
        BackupCommand::Create => {
            let db = open_db_unmigrated(config)?;
            let snapshot = backup::snapshot(&db, &config.backups_dir, "manual", None)?;
            println!(
                "{} {} ({} bytes)",
                "Snapshot written".green(),
                snapshot.path,
                snapshot.snapshot_size
            );
        }
        BackupCommand::List => {
            let db = open_db_unmigrated(config)?;
            let snapshots = db.list_snapshots()?;
            if snapshots.is_empty() {
                println!("No snapshots recorded");
            }
            for snapshot in snapshots {
                println!(
                    "{:>4}  {}  {:<14} {}  {}",
                    snapshot.id,
                    snapshot.created_at,
                    snapshot.reason,
                    version_label(snapshot.for_version),
                    snapshot.path
                );
            }
        }
        BackupCommand::Restore { snapshot, yes } => {
            let prompt = format!(
                "Replace {} with {}?",
                config.catalog_path.display(),
                snapshot.display()
            );
            if !yes && !prompt_confirm(&prompt, Some(false))? {
                return Ok(());
            }
            backup::restore(&snapshot, &config.catalog_path)?;
            println!("{} {}", "Restored".green(), config.catalog_path.display());
        }
        BackupCommand::Prune { keep } => {
            let db = open_db_unmigrated(config)?;
            let removed = backup::prune_snapshots(&db, keep)?;
            println!("Pruned {} snapshot(s)", removed.len());
        }
    }
    Ok(())
}

fn run_remove_asset(config: &AppConfig, hash: &str, tombstone: bool, yes: bool) -> Result<()> {
    let db = open_db(config)?;
    let asset = db
        .find_asset(hash)?
        .with_context(|| format!("asset '{}' not found", hash))?;
    let mode = if tombstone {
        RemovalMode::Tombstone
    } else {
        RemovalMode::Remove
    };
    let prompt = format!("Remove {} ({:?})?", asset.archive_path, mode);
    if !yes && !prompt_confirm(&prompt, Some(false))? {
        return Ok(());
    }

    let outcome = remove_asset(
        &db,
        &config.archive_root,
        &config.backups_dir,
        asset.category(),
        &asset.content_hash,
        mode,
    )?;
    if let Some(snapshot) = &outcome.snapshot {
        println!("  {} snapshot {}", "✓".green(), snapshot.path);
    }
    if let Some(trash) = &outcome.trash_path {
        println!("  file kept at {}", trash.display());
    }
    if outcome.file_was_missing {
        println!("  {} backing file was already missing", "warning".yellow());
    }
    println!("{} {}", "Removed".green(), asset.archive_path);
    Ok(())
}

fn run_link(config: &AppConfig, hash: &str, other: Option<&str>, remove: bool) -> Result<()> {
    let db = open_db(config)?;
    match (other, remove) {
        (Some(other), false) => {
            if catalog::link_assets(&db, hash, other)? {
                println!("{}", "Linked".green());
            } else {
                println!("Already linked");
            }
        }
        (Some(other), true) => {
            if catalog::unlink_assets(&db, hash, other)? {
                println!("{}", "Unlinked".green());
            } else {
                println!("No such link");
            }
        }
        (None, _) => {
            let linked = catalog::linked_assets(&db, hash)?;
            if linked.is_empty() {
                println!("No linked assets");
            }
            for (category, linked_hash) in linked {
                println!("{:<9} {}", category.to_string(), linked_hash);
            }
        }
    }
    Ok(())
}

fn run_batches(config: &AppConfig, limit: i64) -> Result<()> {
    let db = open_db(config)?;
    for batch in db.list_import_batches(limit)? {
        let status = match batch.status.as_str() {
            "completed" => batch.status.as_str().green(),
            "failed" => batch.status.as_str().red(),
            other => other.yellow(),
        };
        println!(
            "{}  {}  {:<9}  {} files: {} imported, {} duplicates, {} skipped, {} failed",
            batch.id.cyan(),
            batch.started_at,
            status,
            batch.total_files,
            batch.imported,
            batch.duplicates,
            batch.skipped,
            batch.failed
        );
    }
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
