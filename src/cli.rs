// Command-line surface of the keyfix binary

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use keyfix::config::{OutputFormat, Settings};
use keyfix::keyring::{derive_key_info, inspect_keyring, DerivedKeyInfo, KeyringEntry};
use keyfix::reconcile::{OutcomeKind, ReconcileReport, Reconciler, RecordOutcome};
use keyfix::store::SqliteRecordStore;

#[derive(Parser)]
#[command(name = "keyfix")]
#[command(about = "Reconcile stored OpenPGP key ids and expirations with their key-rings", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a reconciliation pass over the record store
    Run(RunArgs),
    /// Show the certificates of a key-ring file
    Inspect(InspectArgs),
}

impl Commands {
    /// Whether debug logging was asked for on the command line
    pub fn verbose(&self) -> bool {
        match self {
            Commands::Run(args) => args.verbose,
            Commands::Inspect(args) => args.verbose,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Write corrections (default is a dry run)
    #[arg(long)]
    pub apply: bool,

    /// Check every record, not only those with an unset expiration
    #[arg(long)]
    pub all_keys: bool,

    /// Only records of this owner
    #[arg(long)]
    pub owner: Option<String>,

    /// At most this many records (0 = no limit)
    #[arg(long)]
    pub limit: Option<u32>,

    /// SQLite database holding the records
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// JSON settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(long)]
    pub format: Option<OutputFormat>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Armored or binary key-ring file
    #[arg(long)]
    pub keyring: PathBuf,

    /// Derive the key id and expiration for this address
    #[arg(long)]
    pub address: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

pub fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Run(args) => handle_run(args),
        Commands::Inspect(args) => handle_inspect(args),
    }
}

/// Settings file overlaid with command-line flags
pub fn settings_for(args: &RunArgs) -> Result<Settings> {
    let mut settings = Settings::load_or_default(args.config.as_deref())?;

    settings.apply |= args.apply;
    settings.all_keys |= args.all_keys;
    settings.verbose |= args.verbose;
    if let Some(owner) = &args.owner {
        settings.owner = Some(owner.clone());
    }
    if let Some(limit) = args.limit {
        settings.limit = limit;
    }
    if let Some(database) = &args.database {
        settings.database = database.clone();
    }
    if let Some(format) = args.format {
        settings.format = format;
    }

    Ok(settings)
}

fn handle_run(args: RunArgs) -> Result<()> {
    let settings = settings_for(&args)?;

    if !settings.database.is_file() {
        bail!("database {} does not exist", settings.database.display());
    }
    let store = SqliteRecordStore::open(&settings.database)
        .with_context(|| format!("opening {}", settings.database.display()))?;

    let mut reconciler = Reconciler::new(store, settings.reconcile_config());
    let report = reconciler.run()?;

    print_report(&report, settings.format)?;

    report
        .into_result()
        .context("reconciliation stopped before all records were processed")?;
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let blob = fs::read(&args.keyring)
        .with_context(|| format!("reading {}", args.keyring.display()))?;

    let certificates = inspect_keyring(&blob)?;
    let derived = match &args.address {
        Some(address) => Some(derive_key_info(&blob, address)?),
        None => None,
    };

    print_inspection(&certificates, derived.as_ref(), args.format)
}

#[derive(Serialize)]
struct Inspection<'a> {
    certificates: &'a [KeyringEntry],
    #[serde(skip_serializing_if = "Option::is_none")]
    derived: Option<&'a DerivedKeyInfo>,
}

fn print_inspection(
    certificates: &[KeyringEntry],
    derived: Option<&DerivedKeyInfo>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = Inspection {
                certificates,
                derived,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for entry in certificates {
                let key_id = entry
                    .key_id
                    .as_ref()
                    .map_or_else(|| "(none)".to_string(), |k| k.to_string());
                println!("Key {} created {}", key_id, entry.created.format("%Y-%m-%d %H:%M:%S UTC"));
                if entry.addresses.is_empty() {
                    println!("  No identities");
                }
                for address in &entry.addresses {
                    println!("  {}", address);
                }
            }
            if let Some(derived) = derived {
                println!("Address: {}", derived.address);
                println!("Key id: {} / {}", derived.key_id, derived.key_id.short_form());
                println!("Expires: {}", derived.expiration);
            }
        }
    }
    Ok(())
}

fn print_report(report: &ReconcileReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            for outcome in &report.outcomes {
                println!("{}", outcome_line(outcome));
            }

            let stats = &report.statistics;
            println!();
            println!(
                "Run {} ({})",
                report.run_id,
                if report.apply { "applied" } else { "dry run" }
            );
            println!("  Examined:      {}", stats.examined);
            println!("  Unchanged:     {}", stats.unchanged);
            println!("  Updated:       {}", stats.updated);
            println!("  Pending:       {}", stats.pending);
            println!("  Failed:        {}", stats.failed);
            for (reason, count) in &stats.failures_by_reason {
                println!("    {}: {}", reason, count);
            }
            println!("  Unreadable:    {}", stats.unreadable);
            println!("  Discrepancies: {}", stats.key_id_discrepancies);
            if let Some(halted) = &report.halted {
                println!(
                    "  Halted at {} <{}>: {}",
                    halted.owner, halted.address, halted.error
                );
            }
        }
    }
    Ok(())
}

fn outcome_line(outcome: &RecordOutcome) -> String {
    let subject = format!(
        "{} <{}> {}",
        outcome.owner, outcome.address, outcome.stored_key_id
    );

    let change = match (&outcome.key_id, &outcome.expiration) {
        (Some(key_id), Some(expiration)) => format!("{} expires {}", key_id, expiration),
        _ => String::new(),
    };

    match &outcome.kind {
        OutcomeKind::Unchanged => format!("{}: unchanged", subject),
        OutcomeKind::Updated => format!("{}: updated to {}", subject, change),
        OutcomeKind::Pending => format!("{}: would update to {}", subject, change),
        OutcomeKind::Failed { reason } => format!("{}: failed: {}", subject, reason),
        OutcomeKind::Unreadable { cause } => format!("{}: unreadable: {}", subject, cause),
        OutcomeKind::Halted { error } => format!("{}: halted: {}", subject, error),
    }
}
