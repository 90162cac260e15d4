use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "archivist")]
#[command(about = "Content-addressed archive of places: photos, videos and documents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage documented locations
    #[command(subcommand)]
    Location(LocationCommand),
    /// Manage sub-locations (buildings, rooms) of a location
    #[command(subcommand)]
    SubLocation(SubLocationCommand),
    /// Import files or directories into the archive
    Import(ImportArgs),
    /// Re-hash archived files and report drift
    Verify {
        /// Only assets of this location (full or short id)
        #[arg(long, conflicts_with = "batch")]
        location: Option<String>,
        /// Only assets imported by this batch
        #[arg(long)]
        batch: Option<String>,
    },
    /// Inspect or advance the catalog schema
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Catalog snapshots
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Remove an asset from the catalog and the archive
    RemoveAsset {
        /// Full content hash
        hash: String,
        /// Keep the file under .trash/ instead of deleting it
        #[arg(long)]
        tombstone: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Link two assets, or show the links of one
    Link {
        hash: String,
        other: Option<String>,
        /// Remove the link instead of adding it
        #[arg(long, requires = "other")]
        remove: bool,
    },
    /// List recent import batches
    Batches {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Subcommand)]
pub enum LocationCommand {
    /// Register a new location
    Add {
        name: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// List locations with their sub-locations
    List,
    /// Attach a web page URL to a location
    AddUrl { location: String, url: String },
}

#[derive(Debug, Subcommand)]
pub enum SubLocationCommand {
    /// Register a sub-location under an existing location
    Add { location: String, name: String },
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Target location (full or short id)
    #[arg(short, long)]
    pub location: String,
    /// Target sub-location (full or short id)
    #[arg(short, long)]
    pub sub_location: Option<String>,
    /// Files and directories to import
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Show the catalog version and pending steps
    Status,
    /// List every step of the chain
    List,
    /// Apply pending steps, each preceded by a verified snapshot
    Upgrade {
        /// Stop after this version instead of the latest
        #[arg(long)]
        to: Option<String>,
        /// Skip the per-step snapshots
        #[arg(long)]
        no_backup: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Take a verified snapshot now
    Create,
    /// List recorded snapshots
    List,
    /// Copy a snapshot back over the catalog
    Restore {
        snapshot: PathBuf,
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete all but the newest snapshots
    Prune { keep: usize },
}
