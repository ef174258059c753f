//! Non-interactive maintenance commands for a tripkeep data directory.

use std::{fmt, path::PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tripkeep_config::{ConfigManager, StoreConfig};
use tripkeep_domain::{BackupRecord, BackupType};
use tripkeep_storage_json::{BackupFilter, GcOptions};

use crate::{utils, Result, TripStore, TripStoreError};

#[derive(Debug, Parser)]
#[command(name = "tripkeep_cli")]
#[command(about = "Inspect and repair a tripkeep data directory", version)]
pub struct Cli {
    /// Data directory; overrides the config file and TRIPKEEP_HOME.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file to read instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List catalog entries, newest first.
    ListBackups(ListBackupsArgs),
    /// Backup counts and sizes per type.
    Stats,
    /// Delete backups past the retention window.
    Gc(GcArgs),
    /// Reconcile the catalog with the backups directory.
    Sync,
    /// Check that every cost tracking link points at an expense of the trip.
    Validate { id: String },
    /// Back up a trip, then delete it.
    DeleteTrip { id: String },
    /// Back up a trip's cost data, then clear it.
    DeleteCosts { id: String },
    /// Restore a trip backup as the live record.
    Restore { backup_id: String },
    /// Put cost data and links back from a cost backup.
    RestoreCosts { backup_id: String },
    /// Print build metadata.
    Version,
}

#[derive(Debug, Args)]
pub struct ListBackupsArgs {
    /// `trip` or `cost`.
    #[arg(long = "type", value_parser = parse_backup_type)]
    pub backup_type: Option<BackupType>,
    #[arg(long)]
    pub search: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD` or RFC 3339.
    #[arg(long, value_parser = parse_lower_bound)]
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound, `YYYY-MM-DD` (whole day) or RFC 3339.
    #[arg(long, value_parser = parse_upper_bound)]
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Args)]
pub struct GcArgs {
    #[arg(long)]
    pub retention_days: Option<u32>,
    #[arg(long)]
    pub keep_latest: Option<usize>,
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

/// Runs one parsed command, printing results to stdout.
pub fn run(cli: Cli) -> Result<()> {
    if let Command::Version = cli.command {
        println!("{}", utils::build_info::current().summary());
        return Ok(());
    }

    let config = resolve_config(cli.config, cli.root)?;
    utils::init_tracing(config.log_filter.as_deref());
    let store = TripStore::from_config(&config)?;

    match cli.command {
        Command::ListBackups(args) => {
            let filter = BackupFilter {
                backup_type: args.backup_type,
                date_from: args.from,
                date_to: args.to,
                search_query: args.search,
            };
            let backups = store.list_backups(&filter)?;
            if backups.is_empty() {
                info("no backups found");
            }
            for backup in &backups {
                println!("{}", BackupLine(backup));
            }
        }
        Command::Stats => {
            let stats = store.get_storage_stats()?;
            section("Backup storage");
            println!("{} backups, {} bytes", stats.total_backups, stats.total_bytes);
            for (kind, per_type) in &stats.by_type {
                println!(
                    "  {:<5} {:>5} backups {:>10} bytes",
                    kind.as_str(),
                    per_type.count,
                    per_type.bytes
                );
            }
            if let (Some(oldest), Some(newest)) = (stats.oldest_backup, stats.newest_backup) {
                println!("  oldest {}  newest {}", oldest.to_rfc3339(), newest.to_rfc3339());
            }
        }
        Command::Gc(args) => {
            let defaults = store.gc_defaults();
            let options = GcOptions {
                retention_days: args.retention_days.unwrap_or(defaults.retention_days),
                keep_latest: args.keep_latest.unwrap_or(defaults.keep_latest),
                dry_run: args.dry_run,
            };
            let report = store.garbage_collect(&options)?;
            let verb = if options.dry_run { "would delete" } else { "deleted" };
            for backup in &report.deleted {
                println!("{} {}", verb, BackupLine(backup));
            }
            success(format!(
                "{} {} backups, retained {}",
                verb,
                report.deleted.len(),
                report.retained.len()
            ));
        }
        Command::Sync => {
            let report = store.synchronize_metadata()?;
            for backup in &report.removed {
                warning(format!("dropped entry without payload: {}", BackupLine(backup)));
            }
            for backup in &report.adopted {
                warning(format!("adopted orphaned payload: {}", BackupLine(backup)));
            }
            if report.is_clean() {
                success("catalog already in sync");
            }
        }
        Command::Validate { id } => {
            let report = store.validate_all_trip_boundaries(&id)?;
            if report.is_valid {
                success(format!("trip {} has no dangling cost links", id));
            } else {
                for error in &report.errors {
                    warning(&error.message);
                }
                return Err(TripStoreError::InvalidInput(format!(
                    "trip {} has {} dangling cost links",
                    id,
                    report.errors.len()
                )));
            }
        }
        Command::DeleteTrip { id } => {
            let backup = store.delete_trip_with_backup(&id)?;
            success(format!("deleted trip {} (backup {})", id, backup.id));
        }
        Command::DeleteCosts { id } => {
            let backup = store.delete_cost_tracking_with_backup(&id)?;
            success(format!("cleared cost tracking of {} (backup {})", id, backup.id));
        }
        Command::Restore { backup_id } => {
            let trip = store.restore_trip_from_backup(&backup_id)?;
            success(format!("restored trip {} \"{}\"", trip.id, trip.title));
        }
        Command::RestoreCosts { backup_id } => {
            let trip = store.restore_cost_tracking_from_backup(&backup_id)?;
            success(format!(
                "restored {} expenses and {} links on {}",
                trip.expenses().len(),
                trip.link_count(),
                trip.id
            ));
        }
        Command::Version => {}
    }
    Ok(())
}

/// Prints the error the way the other messages are printed.
pub fn report_error(err: &TripStoreError) {
    eprintln!("{}", format!("ERROR: [x] {}", err).bright_red());
}

fn resolve_config(path: Option<PathBuf>, root: Option<PathBuf>) -> Result<StoreConfig> {
    let manager = path
        .map(ConfigManager::new)
        .unwrap_or_else(ConfigManager::with_default_location);
    let mut config = manager.load()?;
    if root.is_some() {
        config.data_root = root;
    }
    Ok(config)
}

struct BackupLine<'a>(&'a BackupRecord);

impl fmt::Display for BackupLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backup = self.0;
        write!(
            f,
            "{}  {:<4}  {}  {} \"{}\"  ({})",
            backup.id.dimmed(),
            backup.backup_type.as_str(),
            backup.created_at.format("%Y-%m-%d %H:%M:%S"),
            backup.original_id,
            backup.title,
            backup.reason
        )
    }
}

fn section(message: impl fmt::Display) {
    println!("{}", format!("=== {} ===", message).bold());
}

fn info(message: impl fmt::Display) {
    println!("INFO: [i] {}", message);
}

fn success(message: impl fmt::Display) {
    println!("{}", format!("SUCCESS: [ok] {}", message).bright_green());
}

fn warning(message: impl fmt::Display) {
    println!("{}", format!("WARNING: [!] {}", message).bright_yellow());
}

fn parse_backup_type(raw: &str) -> std::result::Result<BackupType, String> {
    BackupType::parse(raw).ok_or_else(|| format!("unknown backup type `{}`", raw))
}

fn parse_lower_bound(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let midnight =
        NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(|| "invalid midnight".to_string())?;
    parse_bound(raw, midnight)
}

fn parse_upper_bound(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| "invalid end of day".to_string())?;
    parse_bound(raw, end_of_day)
}

fn parse_bound(raw: &str, time: NaiveTime) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(DateTime::from_naive_utc_and_offset(date.and_time(time), Utc));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| format!("`{}` is neither YYYY-MM-DD nor RFC 3339: {}", raw, err))
}
