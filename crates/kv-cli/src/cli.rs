//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};

/// kvm - versioned schema migrations for the kiosk versioning database
#[derive(Parser, Debug)]
#[command(name = "kvm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Database URL (duckdb://path, postgres://..., or a DuckDB file path)
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Override the migrations directory
    #[arg(long, global = true)]
    pub migrations_dir: Option<String>,

    /// Seconds to wait for the migration lock
    #[arg(long, global = true, value_name = "SECONDS")]
    pub lock_timeout: Option<u64>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new empty migration
    Generate(GenerateArgs),

    /// Apply pending migrations
    Up(UpArgs),

    /// Revert applied migrations, newest first
    Down(DownArgs),

    /// Revert every applied migration, then apply all migrations again
    Refresh(RefreshArgs),

    /// Show applied and pending migrations
    Status(StatusArgs),
}

/// Arguments for the generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Migration name in snake_case (e.g. create_kiosk_versions_table)
    pub name: String,
}

/// Arguments for the up command
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Apply at most N pending migrations
    #[arg(short = 'n', long, value_name = "N", value_parser = positive_count)]
    pub count: Option<usize>,

    /// Print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the down command
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Revert the N most recent migrations (default from config)
    #[arg(
        short = 'n',
        long,
        value_name = "N",
        conflicts_with = "all",
        value_parser = positive_count
    )]
    pub count: Option<usize>,

    /// Revert every applied migration
    #[arg(long)]
    pub all: bool,

    /// Print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the refresh command
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Print both plans without executing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a migration count; zero is rejected.
fn positive_count(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("count must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
