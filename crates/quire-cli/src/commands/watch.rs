//! Watch mode - rebuild on a fixed interval until Ctrl+C

use super::Context;
use anyhow::{bail, Context as _, Result};
use colored::Colorize;
use quire_build::{BuildError, ConfigLoader, Orchestrator, RunSummary, WatchEvent, WatchLoop};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Watch command arguments
#[derive(Debug, Default)]
pub struct WatchArgs {
    /// Seconds between runs (defaults to the configured interval)
    pub interval: Option<f64>,
    /// Stop after this many runs
    pub max_runs: Option<usize>,
}

pub fn run(ctx: &Context, args: WatchArgs) -> Result<()> {
    let dir = ctx.project_dir()?;
    let config = ctx.load_config()?;
    let interval = match args.interval {
        Some(secs) => interval_from_secs(secs)?,
        None => config.watch_interval(),
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    if !ctx.json && !ctx.quiet {
        println!("Watching {} (Ctrl+C to stop)", dir.display());
    }

    let make = || -> Result<Orchestrator, BuildError> {
        let config = ConfigLoader::new().load_from_directory(&dir)?;
        Ok(ctx.apply_overrides(Orchestrator::new(config)?))
    };

    let flag = running.clone();
    WatchLoop::new(interval).run(running, make, |event| {
        if let Some(limit) = args.max_runs {
            if finished_iteration(&event).is_some_and(|n| n >= limit) {
                flag.store(false, Ordering::SeqCst);
            }
        }

        if ctx.json {
            println!("{}", event.to_json());
        } else if let Some(line) = describe(&event, ctx.quiet) {
            println!("{}", line);
        }
    });

    Ok(())
}

fn interval_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        bail!("Watch interval must be a positive number of seconds, got {}", secs);
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Iteration number of events that end a run
fn finished_iteration(event: &WatchEvent) -> Option<usize> {
    match event {
        WatchEvent::RunComplete { iteration, .. } | WatchEvent::Error { iteration, .. } => {
            Some(*iteration)
        }
        _ => None,
    }
}

/// One line per event; quiet mode keeps only failures
fn describe(event: &WatchEvent, quiet: bool) -> Option<String> {
    let line = match event {
        WatchEvent::Started { goal, interval_ms } if !quiet => {
            format!("Running '{}' every {:.1}s", goal, *interval_ms as f64 / 1000.0)
        }
        WatchEvent::RunComplete { iteration, summary } => {
            if quiet && summary.is_success() {
                return None;
            }
            format!("[{}] #{} {}", timestamp(), iteration, run_outcome(summary))
        }
        WatchEvent::Error { iteration, message } => format!(
            "[{}] #{} {} {}",
            timestamp(),
            iteration,
            "error:".red().bold(),
            message
        ),
        WatchEvent::Shutdown { iterations } if !quiet => {
            format!("Stopped after {} run(s)", iterations)
        }
        _ => return None,
    };
    Some(line)
}

fn run_outcome(summary: &RunSummary) -> String {
    if !summary.is_success() {
        return format!("{} unit(s) failed", summary.failed_count())
            .red()
            .to_string();
    }
    if summary.invocations == 0 {
        return "up to date".dimmed().to_string();
    }
    format!(
        "converted {}, compiled {}",
        summary.converted.len(),
        summary.compiled.len()
    )
    .green()
    .to_string()
}

/// Wall-clock time of day (UTC) as HH:MM:SS
fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs() % 86_400;
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
        })
        .unwrap_or_else(|_| "00:00:00".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_validation() {
        assert_eq!(interval_from_secs(0.5).unwrap(), Duration::from_millis(500));
        assert!(interval_from_secs(0.0).is_err());
        assert!(interval_from_secs(-1.0).is_err());
        assert!(interval_from_secs(f64::NAN).is_err());
    }

    #[test]
    fn test_finished_iteration() {
        let done = WatchEvent::RunComplete {
            iteration: 3,
            summary: RunSummary::default(),
        };
        let started = WatchEvent::RunStarted { iteration: 3 };
        assert_eq!(finished_iteration(&done), Some(3));
        assert_eq!(finished_iteration(&started), None);
    }

    #[test]
    fn test_quiet_hides_successful_runs() {
        let done = WatchEvent::RunComplete {
            iteration: 1,
            summary: RunSummary::default(),
        };
        assert!(describe(&done, true).is_none());
        assert!(describe(&done, false).unwrap().contains("#1"));

        let error = WatchEvent::Error {
            iteration: 2,
            message: "Goal not found: x".to_string(),
        };
        assert!(describe(&error, true).unwrap().contains("Goal not found: x"));
    }
}
