//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including the `YYYY-MM-DD:YYYY-MM-DD` range validation.

use crate::models::DateWindow;
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Widest range the GitHub statistics endpoints can serve reliably.
pub const MAX_RANGE_DAYS: i64 = 60;

/// AutoRF - retro funding weights from GitHub activity
///
/// Computes each registered project's share of its funding pool from
/// recent GitHub activity and keeps the pool's payout split in sync.
///
/// Examples:
///   autorf update-weights
///   autorf update-weights --range 2024-05-01:2024-05-31 --dump weights/
///   autorf update-weights --from-file weights/<POOL_ID>.txt --pool <POOL_ID>
///   autorf populate-db --user-id <USER_ID>
///   autorf init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .autorf.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// GitHub token used for the statistics API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub github_token: Option<String>,

    /// Row store (PostgREST) base URL
    #[arg(long, env = "SUPABASE_URL", global = true)]
    pub store_url: Option<String>,

    /// Row store API key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true, global = true)]
    pub store_key: Option<String>,

    /// Split relay base URL
    #[arg(long, env = "SPLITS_RELAY_URL", global = true)]
    pub splits_url: Option<String>,

    /// Split relay API key
    #[arg(long, env = "SPLITS_API_KEY", hide_env_values = true, global = true)]
    pub splits_api_key: Option<String>,

    /// Operator wallet that owns created splits and seed registrations
    #[arg(long, env = "OPERATOR_ADDRESS", global = true)]
    pub operator_address: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Populate the row store with a seed pool and registrations
    PopulateDb(PopulateDbArgs),

    /// Compute weights and update every pool's split
    UpdateWeights(UpdateWeightsArgs),

    /// Generate a default .autorf.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PopulateDbArgs {
    /// User that owns the seed pool and its registrations
    #[arg(long, env = "POPULATE_USER_ID")]
    pub user_id: String,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct UpdateWeightsArgs {
    /// Range of the weights to update (YYYY-MM-DD:YYYY-MM-DD)
    ///
    /// At most 60 days. Defaults to the last 7 days.
    #[arg(long, value_name = "FROM:TO", value_parser = parse_range)]
    pub range: Option<DateRange>,

    /// Write computed weights to recovery files (one per pool) in DIR
    #[arg(long, value_name = "DIR")]
    pub dump: Option<PathBuf>,

    /// Skip aggregation and distribute weights read from a recovery file
    #[arg(long, value_name = "FILE", requires = "pool", conflicts_with = "range")]
    pub from_file: Option<PathBuf>,

    /// Pool the recovery file belongs to
    #[arg(long, value_name = "POOL_ID", requires = "from_file")]
    pub pool: Option<String>,

    /// Output file path for the run report
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Output format of the run report (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Compute and report weights without touching any split or pool
    #[arg(long)]
    pub dry_run: bool,
}

/// Output format for the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Inclusive calendar-day range given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Number of days between the two dates.
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days()
    }

    /// Window from the start of `from` to the last millisecond of `to`.
    pub fn to_window(&self) -> DateWindow {
        let start = Utc.from_utc_datetime(&self.from.and_time(NaiveTime::MIN));
        let end_of_day = Utc.from_utc_datetime(&self.to.and_time(NaiveTime::MIN))
            + Duration::days(1)
            - Duration::milliseconds(1);
        DateWindow::new(start, end_of_day)
    }
}

/// Parse and validate `YYYY-MM-DD:YYYY-MM-DD`.
pub fn parse_range(value: &str) -> Result<DateRange, String> {
    let (from, to) = value
        .split_once(':')
        .ok_or_else(|| format!("Invalid range '{}': expected YYYY-MM-DD:YYYY-MM-DD", value))?;

    let parse = |s: &str| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| format!("Invalid date '{}': {}", s, e))
    };

    let range = DateRange {
        from: parse(from)?,
        to: parse(to)?,
    };

    if range.from > range.to {
        return Err(format!(
            "Invalid range: {} is after {}",
            range.from, range.to
        ));
    }

    if range.days() > MAX_RANGE_DAYS {
        return Err(format!(
            "Range spans {} days; at most {} are supported",
            range.days(),
            MAX_RANGE_DAYS
        ));
    }

    Ok(range)
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref address) = self.operator_address {
            if !crate::models::is_valid_address(address) {
                return Err(format!("Operator address is not a valid address: {}", address));
            }
        }

        if let Command::UpdateWeights(ref update) = self.command {
            if let Some(ref path) = update.from_file {
                if !path.is_file() {
                    return Err(format!("Recovery file does not exist: {}", path.display()));
                }
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
