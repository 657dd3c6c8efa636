//! Dry run: report the staleness of every unit

use super::Context;
use anyhow::{Context as _, Result};
use colored::Colorize;
use quire_build::UnitStatus;

pub fn run(ctx: &Context) -> Result<bool> {
    let orchestrator = ctx.orchestrator()?;
    let statuses = orchestrator
        .status()
        .context("Failed to evaluate project status")?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(true);
    }

    if statuses.is_empty() {
        println!("No sources match '{}'", orchestrator.config().project.sources.pattern);
        return Ok(true);
    }

    let stale = statuses.iter().filter(|s| s.staleness.is_stale()).count();
    for status in &statuses {
        if ctx.quiet && !status.staleness.is_stale() {
            continue;
        }
        println!("{}", status_line(status));
    }
    if !ctx.quiet {
        println!("\n{} of {} unit(s) stale", stale, statuses.len());
    }
    Ok(true)
}

fn status_line(status: &UnitStatus) -> String {
    let marker = if status.staleness.is_stale() {
        "stale".yellow()
    } else {
        "fresh".green()
    };
    format!(
        "  {:<5}  {}  -> {} ({})",
        marker,
        status.unit,
        status.path.display(),
        status.staleness.describe()
    )
}
