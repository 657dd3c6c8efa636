//! External tool invocation
//!
//! Converters and compilers are plain subprocesses: an argument template is
//! expanded per unit, the program runs with stdout and stderr captured, and the
//! exit status decides success.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Values substituted into `{name}` placeholders of an argument template
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: Vec<(&'static str, String)>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a placeholder to a value
    pub fn set(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.values.push((name, value.into()));
        self
    }

    /// Bind a placeholder to a path
    pub fn set_path(self, name: &'static str, path: &Path) -> Self {
        self.set(name, path.to_string_lossy())
    }

    /// Substitute every bound placeholder in one argument
    pub fn expand(&self, arg: &str) -> String {
        let mut expanded = arg.to_string();
        for (name, value) in &self.values {
            let token = format!("{{{}}}", name);
            if expanded.contains(&token) {
                expanded = expanded.replace(&token, value);
            }
        }
        expanded
    }

    /// Expand a whole argument template
    pub fn expand_all(&self, template: &[String]) -> Vec<String> {
        template.iter().map(|arg| self.expand(arg)).collect()
    }
}

/// A fully expanded subprocess invocation
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append arguments
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Run the tool from this directory
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Command line as a single display string
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run to completion, capturing output
    pub fn run(&self) -> io::Result<ToolOutput> {
        tracing::debug!(command = %self.command_line(), "spawning tool");
        let start = Instant::now();

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command.spawn()?.wait_with_output()?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            elapsed: start.elapsed(),
        })
    }
}

/// Captured result of a tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code; `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Check if the tool succeeded
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable exit status
    pub fn status(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }

    /// Get combined output
    pub fn output(&self) -> String {
        let mut output = String::new();
        if !self.stdout.is_empty() {
            output.push_str("STDOUT:\n");
            output.push_str(&self.stdout);
            if !self.stdout.ends_with('\n') {
                output.push('\n');
            }
        }
        if !self.stderr.is_empty() {
            output.push_str("STDERR:\n");
            output.push_str(&self.stderr);
        }
        output
    }
}
