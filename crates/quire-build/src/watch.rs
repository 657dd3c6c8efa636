//! Polling watch loop
//!
//! Re-runs a goal on a fixed interval until the `running` flag is cleared.
//! Each iteration gets a fresh orchestrator, so discovery and staleness are
//! evaluated from scratch every time.

use crate::error::BuildResult;
use crate::goals::BUILD_ALL;
use crate::orchestrator::{Orchestrator, RunSummary};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest stretch of sleep between checks of the `running` flag
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Events delivered to the watch callback
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    Started { goal: String, interval_ms: u64 },
    RunStarted { iteration: usize },
    RunComplete { iteration: usize, summary: RunSummary },
    Error { iteration: usize, message: String },
    Shutdown { iterations: usize },
}

impl WatchEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Repeatedly runs a goal with a pause in between
#[derive(Debug, Clone)]
pub struct WatchLoop {
    interval: Duration,
    goal: String,
}

impl WatchLoop {
    /// Watch `build-all` at the given interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            goal: BUILD_ALL.to_string(),
        }
    }

    /// Watch a different goal
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Loop until `running` is cleared, returning the number of iterations
    ///
    /// `make` builds the orchestrator for each iteration. A fatal error from
    /// either `make` or the run is delivered as [`WatchEvent::Error`] and the
    /// loop carries on.
    pub fn run<M, C>(&self, running: Arc<AtomicBool>, mut make: M, mut callback: C) -> usize
    where
        M: FnMut() -> BuildResult<Orchestrator>,
        C: FnMut(WatchEvent),
    {
        callback(WatchEvent::Started {
            goal: self.goal.clone(),
            interval_ms: self.interval.as_millis() as u64,
        });

        let mut iterations = 0;
        while running.load(Ordering::SeqCst) {
            iterations += 1;
            callback(WatchEvent::RunStarted {
                iteration: iterations,
            });

            match make().and_then(|mut orchestrator| orchestrator.run(&self.goal)) {
                Ok(summary) => callback(WatchEvent::RunComplete {
                    iteration: iterations,
                    summary,
                }),
                Err(e) => {
                    warn!(iteration = iterations, error = %e, "watch iteration failed");
                    callback(WatchEvent::Error {
                        iteration: iterations,
                        message: e.to_string(),
                    });
                }
            }

            sleep_while_running(self.interval, &running);
        }

        debug!(iterations, "watch loop stopped");
        callback(WatchEvent::Shutdown { iterations });
        iterations
    }
}

/// Watch `build-all` until `running` is cleared
pub fn watch<M, C>(interval: Duration, running: Arc<AtomicBool>, make: M, callback: C) -> usize
where
    M: FnMut() -> BuildResult<Orchestrator>,
    C: FnMut(WatchEvent),
{
    WatchLoop::new(interval).run(running, make, callback)
}

fn sleep_while_running(interval: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;

    #[test]
    fn test_cleared_flag_runs_nothing() {
        let running = Arc::new(AtomicBool::new(false));
        let mut events = Vec::new();

        let iterations = watch(
            Duration::from_secs(60),
            running,
            || Err(BuildError::WorkerPool("unused".to_string())),
            |event| events.push(event),
        );

        assert_eq!(iterations, 0);
        assert!(matches!(events[0], WatchEvent::Started { .. }));
        assert!(matches!(events[1], WatchEvent::Shutdown { iterations: 0 }));
    }

    #[test]
    fn test_errors_do_not_stop_the_loop() {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let mut attempts = 0;
        let mut errors = 0;

        let iterations = WatchLoop::new(Duration::from_millis(1)).run(
            running,
            || {
                attempts += 1;
                if attempts == 3 {
                    flag.store(false, Ordering::SeqCst);
                }
                Err(BuildError::CircularGoal("a -> a".to_string()))
            },
            |event| {
                if let WatchEvent::Error { .. } = event {
                    errors += 1;
                }
            },
        );

        assert_eq!(iterations, 3);
        assert_eq!(errors, 3);
    }

    #[test]
    fn test_sleep_observes_cancellation() {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            flag.store(false, Ordering::SeqCst);
        });

        let start = Instant::now();
        sleep_while_running(Duration::from_secs(30), &running);
        stopper.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_event_json() {
        let event = WatchEvent::Error {
            iteration: 2,
            message: "Goal not found: x".to_string(),
        };
        assert_eq!(
            event.to_json(),
            r#"{"event":"error","iteration":2,"message":"Goal not found: x"}"#
        );
    }
}
