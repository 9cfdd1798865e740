//! Markdown and JSON rendering of run reports.

use super::{RunReport, WeightSource};
use crate::cli::OutputFormat;
use crate::reconcile::{PoolOutcome, SplitAction};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# AutoRF Weight Report\n\n");
    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_summary_section(report));

    for pool in &report.pools {
        output.push_str(&generate_pool_section(pool));
    }

    output.push_str("---\n\n");
    output.push_str(&format!(
        "*Generated by AutoRF v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    output
}

fn generate_metadata_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    match report.source {
        WeightSource::Github => {
            if let Some(ref window) = report.window {
                section.push_str(&format!("- **Window:** {}\n", window));
            }
        }
        WeightSource::RecoveryFile(ref path) => {
            section.push_str(&format!("- **Recovery File:** `{}`\n", path));
        }
    }
    if report.dry_run {
        section.push_str("- **Mode:** dry run (no splits submitted)\n");
    }
    section.push_str(&format!("- **Duration:** {:.1}s\n", report.duration_seconds));
    section.push('\n');

    section
}

fn generate_summary_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Outcome | Pools |\n");
    section.push_str("|---------|-------|\n");
    for action in [
        SplitAction::Created,
        SplitAction::Updated,
        SplitAction::Skipped,
        SplitAction::DryRun,
    ] {
        let count = report.count(action);
        if count > 0 {
            section.push_str(&format!("| {} | {} |\n", action, count));
        }
    }
    section.push_str(&format!("| **Total** | **{}** |\n\n", report.pools.len()));

    section
}

fn generate_pool_section(pool: &PoolOutcome) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Pool `{}`\n\n", pool.pool_id));
    section.push_str(&format!("- **Outcome:** {}\n", pool.action));
    if let Some(ref address) = pool.split_address {
        section.push_str(&format!("- **Split:** `{}`\n", address));
    }
    if let Some(ref event) = pool.event {
        section.push_str(&format!("- **Event:** {}\n", event));
    }
    section.push('\n');

    if pool.weights.is_empty() {
        section.push_str("_No eligible contributors._\n\n");
        return section;
    }

    section.push_str("| Project | Wallet | Kind | Allocation |\n");
    section.push_str("|---------|--------|------|------------|\n");
    for weight in &pool.weights {
        section.push_str(&format!(
            "| {} | `{}` | {} | {:.4}% |\n",
            weight.contributor.slug(),
            weight.contributor.wallet,
            weight.kind,
            weight.allocated_funding
        ));
    }
    section.push('\n');

    section
}

/// Generate JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render `report` in `format` and write it to `path`.
pub fn write_report(report: &RunReport, format: OutputFormat, path: &Path) -> Result<()> {
    let content = match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Markdown => generate_markdown_report(report),
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
