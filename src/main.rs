//! `brd` command line interface.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use branch_directory::config::{load_config, Config};
use branch_directory::{enrich, normalize, stats, validate};

#[derive(Parser)]
#[command(name = "brd", version, about = "Branch directory dataset tooling")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/brd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite every dataset in the tree into the canonical shape.
    ///
    /// Legacy field spellings are migrated, envelope fields are filled in
    /// from the file path, and files already in canonical form are left
    /// untouched. Running twice is a no-op.
    Normalize {
        /// Report what would change without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Check every dataset against the schema and verification rules.
    ///
    /// Reports all findings across all files; never modifies anything.
    /// Exits non-zero when any error-severity finding exists.
    Validate,

    /// Print dataset, branch, and verification coverage counts.
    Stats,

    /// Run one enrichment pass over the tree.
    Enrich {
        /// Which pass to run.
        #[arg(value_enum)]
        pass: EnrichPass,

        /// Report what would change without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EnrichPass {
    /// Add chain store locator URLs as sources for sourceless branches.
    ChainSources,
    /// Extract source citations embedded in notes prose.
    NotesSources,
    /// Rewrite manufacturer names to their configured canonical forms.
    StandardizeBrands,
    /// Mark addresses verified when authoritative sources support it.
    PromoteVerification,
    /// Backfill geo precision metadata from verification fields.
    GeoBackfill,
    /// Seed arrival coordinates from display coordinates.
    ArrivalMigrate,
    /// Apply operator-supplied arrival coordinate overrides.
    ArrivalRefine,
}

fn run(config: &Config, command: Commands) -> Result<bool> {
    let today = chrono::Local::now().date_naive();
    match command {
        Commands::Normalize { dry_run } => normalize::run_normalize(config, dry_run, today),
        Commands::Validate => validate::run_validate(config, today),
        Commands::Stats => stats::run_stats(config),
        Commands::Enrich { pass, dry_run } => match pass {
            EnrichPass::ChainSources => enrich::run_chain_sources(config, dry_run),
            EnrichPass::NotesSources => enrich::run_notes_sources(config, dry_run),
            EnrichPass::StandardizeBrands => enrich::run_standardize_brands(config, dry_run),
            EnrichPass::PromoteVerification => enrich::run_promote_verification(config, dry_run),
            EnrichPass::GeoBackfill => enrich::run_geo_backfill(config, dry_run),
            EnrichPass::ArrivalMigrate => enrich::run_arrival_migrate(config, dry_run),
            EnrichPass::ArrivalRefine => enrich::run_arrival_refine(config, dry_run, today),
        },
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if !run(&config, cli.command)? {
        std::process::exit(1);
    }
    Ok(())
}
