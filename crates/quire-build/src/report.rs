//! Failure reporting
//!
//! Each failed unit is written to the sink as one delimited block holding the
//! unit, the failure kind and the tool's raw output, so diagnostics from
//! different units never interleave.

use crate::error::StageError;
use crate::unit::Unit;
use serde::Serialize;
use std::io::{self, Write};

const HEAVY_RULE: &str = "============================================================";
const LIGHT_RULE: &str = "------------------------------------------------------------";

/// A recorded unit failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub unit: Unit,
    pub kind: &'static str,
    pub reason: String,
    pub output: String,
}

impl From<&StageError> for UnitFailure {
    fn from(error: &StageError) -> Self {
        Self {
            unit: error.unit().clone(),
            kind: error.kind(),
            reason: error.reason().to_string(),
            output: error.output().to_string(),
        }
    }
}

/// Collects unit failures and writes each as a delimited block
pub struct FailureReporter {
    sink: Box<dyn Write + Send>,
    failures: Vec<UnitFailure>,
}

impl FailureReporter {
    /// Reporter writing to an arbitrary sink
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink,
            failures: Vec::new(),
        }
    }

    /// Reporter writing to stderr
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    /// Reporter that only records
    pub fn silent() -> Self {
        Self::new(Box::new(io::sink()))
    }

    /// Record a failure and write its block
    pub fn report(&mut self, error: &StageError) {
        let failure = UnitFailure::from(error);
        tracing::debug!(unit = %failure.unit, kind = failure.kind, "unit failed");

        let block = render_block(&failure);
        // Reporting never fails the build; a broken sink only loses the text.
        let _ = self
            .sink
            .write_all(block.as_bytes())
            .and_then(|_| self.sink.flush());

        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[UnitFailure] {
        &self.failures
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Drain the recorded failures, keeping the sink
    pub fn take_failures(&mut self) -> Vec<UnitFailure> {
        std::mem::take(&mut self.failures)
    }
}

impl Default for FailureReporter {
    fn default() -> Self {
        Self::stderr()
    }
}

fn render_block(failure: &UnitFailure) -> String {
    let mut block = String::new();
    block.push_str(HEAVY_RULE);
    block.push('\n');
    block.push_str(&format!("FAILED {} ({})\n", failure.unit, failure.kind));
    block.push_str(&format!("  {}\n", failure.reason));
    if !failure.output.is_empty() {
        block.push_str(LIGHT_RULE);
        block.push('\n');
        block.push_str(&failure.output);
        if !failure.output.ends_with('\n') {
            block.push('\n');
        }
    }
    block.push_str(HEAVY_RULE);
    block.push('\n');
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Stage;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_report_writes_block() {
        let capture = Capture::default();
        let mut reporter = FailureReporter::new(Box::new(capture.clone()));

        let unit = Unit::new("talk.md", "slides", Stage::Compile);
        reporter.report(&StageError::compile(
            unit.clone(),
            "exited with status 1",
            "STDERR:\n! Undefined control sequence.\n",
        ));

        let text = capture.text();
        assert!(text.starts_with(HEAVY_RULE));
        assert!(text.contains("FAILED talk.md [slides] compile (compile)\n"));
        assert!(text.contains("  exited with status 1\n"));
        assert!(text.contains("! Undefined control sequence.\n"));
        assert!(text.ends_with(&format!("{}\n", HEAVY_RULE)));

        assert_eq!(reporter.failure_count(), 1);
        assert_eq!(reporter.failures()[0].unit, unit);
    }

    #[test]
    fn test_blocks_are_separate() {
        let capture = Capture::default();
        let mut reporter = FailureReporter::new(Box::new(capture.clone()));

        reporter.report(&StageError::conversion(
            Unit::new("a.md", "notes", Stage::Convert),
            "exited with status 1",
            "first",
        ));
        reporter.report(&StageError::relocation(
            Unit::new("b.md", "slides", Stage::Compile),
            "missing output",
        ));

        let text = capture.text();
        let first = text.find("FAILED a.md").unwrap();
        let second = text.find("FAILED b.md").unwrap();
        assert!(first < second);
        assert_eq!(text.matches(HEAVY_RULE).count(), 4);
        // Relocation failures have no tool output section
        assert_eq!(text.matches(LIGHT_RULE).count(), 1);
    }

    #[test]
    fn test_take_failures_resets() {
        let mut reporter = FailureReporter::silent();
        reporter.report(&StageError::conversion(
            Unit::new("a.md", "notes", Stage::Convert),
            "x",
            "",
        ));
        assert!(reporter.has_failures());
        assert_eq!(reporter.take_failures().len(), 1);
        assert!(!reporter.has_failures());
    }
}
