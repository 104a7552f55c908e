//! ocl-sync CLI tool
//!
//! Command-line interface for keeping an OCL collection in sync with the mapping closure of
//! a seed list of concepts.
//!
//! ## Commands
//!
//! - `sync`: Full pass. Reads the seed file, walks the concept graph and updates the
//!   collection (use `--dry-run` to only log the plan)
//! - `plan`: Same pass without writing; prints the desired references and the add/delete
//!   lists to stdout
//!
//! Configuration is read from `<config>/default.toml` overlaid with `<config>/local.toml`.
//! `OCL_API_TOKEN` overrides the configured token.

use clap::{Args, Parser, Subcommand};
use ocl_sync::{
    config::{SyncConfig, TomlConfigProvider},
    sync::{run_from_config, SyncReport},
    SyncError,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ocl-sync")]
#[command(author, version, about = "Sync an OCL collection with the mapping closure of a concept list", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunArgs {
    /// Directory holding default.toml and local.toml
    #[arg(short, long, default_value = "config")]
    config: PathBuf,

    /// Seed concept file (overrides concept_file from the config)
    #[arg(long)]
    concepts: Option<PathBuf>,

    /// Maximum number of concept fetches in flight
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the collection with the concept closure
    Sync {
        #[command(flatten)]
        run: RunArgs,

        /// Compute and log the changes without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the desired references and the changes a sync would make
    Plan {
        #[command(flatten)]
        run: RunArgs,
    },
}

fn load_config(args: &RunArgs) -> Result<SyncConfig, SyncError> {
    let mut config = TomlConfigProvider::new(&args.config)
        .with_env_token()
        .load()?;
    if let Some(concepts) = &args.concepts {
        config.concept_file = concepts.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    Ok(config)
}

fn run(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_from_config(config))
}

fn print_plan(report: &SyncReport) {
    println!("=== References ===");
    for reference in report.desired.iter() {
        println!("{reference}");
    }
    println!("\n=== To add ({}) ===", report.plan.to_add.len());
    for reference in report.plan.to_add.iter() {
        println!("{reference}");
    }
    println!("\n=== To delete ({}) ===", report.plan.to_delete.len());
    for reference in report.plan.to_delete.iter() {
        println!("{reference}");
    }
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sync { run: args, dry_run } => load_config(&args).and_then(|mut config| {
            if dry_run {
                config.commit = false;
            }
            run(&config)
        }),
        Commands::Plan { run: args } => load_config(&args).and_then(|mut config| {
            config.commit = false;
            let report = run(&config)?;
            print_plan(&report);
            Ok(report)
        }),
    };

    match result {
        Ok(report) => {
            tracing::info!(
                "Done: {} concepts from {}, {}{}",
                report.concept_count,
                report.version_url,
                report.plan,
                if report.committed { "" } else { " (not committed)" }
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
