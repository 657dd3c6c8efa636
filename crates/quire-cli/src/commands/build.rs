//! Goal commands - convert, compile, build, clean and default

use super::Context;
use anyhow::{Context as _, Result};
use colored::Colorize;
use quire_build::RunSummary;

/// Run a goal and print its summary; returns whether every unit succeeded
pub fn run(ctx: &Context, goal: &str) -> Result<bool> {
    let mut orchestrator = ctx.orchestrator()?;
    let summary = orchestrator
        .run(goal)
        .with_context(|| format!("Goal '{}' failed", goal))?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !ctx.quiet {
        print_summary(&summary);
    } else if !summary.is_success() {
        eprintln!("{}", headline(&summary));
    }

    Ok(summary.is_success())
}

/// Human-readable summary banner
pub fn print_summary(summary: &RunSummary) {
    println!("\n{}", "=".repeat(60));
    println!("{}", headline(summary));
    println!("{}", "=".repeat(60));
    for line in summary_lines(summary) {
        println!("  {}", line);
    }
    println!("{}", "=".repeat(60));
}

fn headline(summary: &RunSummary) -> String {
    let seconds = summary.elapsed_ms as f64 / 1000.0;
    if summary.is_success() {
        format!("'{}' finished in {:.2}s", summary.goal, seconds)
            .green()
            .bold()
            .to_string()
    } else {
        format!(
            "'{}' failed: {} unit(s) failed in {:.2}s",
            summary.goal,
            summary.failed_count(),
            seconds
        )
        .red()
        .bold()
        .to_string()
    }
}

/// Counters worth showing; zero counts are left out
fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![format!("Sources: {}", summary.sources)];

    let counts = [
        ("Converted", summary.converted.len()),
        ("Compiled", summary.compiled.len()),
        ("Up to date", summary.up_to_date),
        ("Removed", summary.removed),
        ("Skipped", summary.skipped.len()),
        ("Failed", summary.failed_count()),
    ];
    for (label, count) in counts {
        if count > 0 {
            lines.push(format!("{}: {}", label, count));
        }
    }

    if summary.invocations == 0 && summary.removed == 0 && summary.up_to_date > 0 {
        lines.push("Everything up to date".to_string());
    }
    for failure in &summary.failed {
        lines.push(format!("{} {} ({})", "x".red(), failure.unit, failure.kind));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_build::{Stage, Unit};

    fn summary(goal: &str) -> RunSummary {
        RunSummary {
            goal: goal.to_string(),
            sources: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_lines_skip_zero_counts() {
        let mut s = summary("build-all");
        s.converted = vec![Unit::new("a.md", "slides", Stage::Convert)];
        s.invocations = 1;

        assert_eq!(summary_lines(&s), vec!["Sources: 2", "Converted: 1"]);
    }

    #[test]
    fn test_lines_note_up_to_date() {
        let mut s = summary("build-all");
        s.up_to_date = 4;

        let lines = summary_lines(&s);
        assert!(lines.contains(&"Up to date: 4".to_string()));
        assert!(lines.contains(&"Everything up to date".to_string()));
    }

    #[test]
    fn test_headline_names_goal() {
        let s = summary("clean-derived");
        assert!(headline(&s).contains("'clean-derived' finished in"));
    }
}
