//! Process invocation and clock capabilities
//!
//! Probes and hooks never touch `tokio::process` or the system clock directly.
//! They go through [`ProcessRunner`] and [`Clock`] so that tests can swap in
//! stubs that record calls and hand out deterministic instants.

use std::fmt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::ProcessError;

/// A program and its arguments, ready to be spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Run a command line through the platform shell (`sh -c` or `cmd /C`)
    pub fn shell(command_line: impl Into<String>) -> Self {
        if cfg!(windows) {
            Self::new("cmd").arg("/C").arg(command_line)
        } else {
            Self::new("sh").arg("-c").arg(command_line)
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Spawns external processes and captures their output.
///
/// Implementations must not treat a non-zero exit as an error.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ProcessError> {
        debug!(command = %invocation, ?timeout, "Spawning process");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, command.output()).await.map_err(|_| {
                ProcessError::TimedOut { program: invocation.program.clone(), timeout: limit }
            })?,
            None => command.output().await,
        }
        .map_err(|source| ProcessError::Spawn { program: invocation.program.clone(), source })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Monotonic clock used for latency measurement
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Milliseconds between two instants as a float
pub(crate) fn elapsed_ms(start: Instant, end: Instant) -> f64 {
    end.saturating_duration_since(start).as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_invocation() {
        let invocation = Invocation::shell("echo hi");
        if cfg!(windows) {
            assert_eq!(invocation.program, "cmd");
            assert_eq!(invocation.args, vec!["/C", "echo hi"]);
        } else {
            assert_eq!(invocation.program, "sh");
            assert_eq!(invocation.args, vec!["-c", "echo hi"]);
        }
    }

    #[test]
    fn test_invocation_display() {
        let invocation = Invocation::new("ping").arg("-c").arg("1").arg("example.com");
        assert_eq!(invocation.to_string(), "ping -c 1 example.com");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_captures_output_and_exit_code() {
        let output = TokioProcessRunner
            .run(&Invocation::shell("echo out; echo err >&2; exit 3"), None)
            .await
            .unwrap();

        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_runner_reports_missing_binary() {
        let result = TokioProcessRunner
            .run(&Invocation::new("definitely-not-a-real-binary-7f3a"), None)
            .await;

        match result {
            Err(ProcessError::Spawn { program, .. }) => {
                assert_eq!(program, "definitely-not-a-real-binary-7f3a")
            }
            other => panic!("Expected ProcessError::Spawn, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_enforces_timeout() {
        let result = TokioProcessRunner
            .run(&Invocation::shell("sleep 5"), Some(Duration::from_millis(50)))
            .await;

        assert!(matches!(result, Err(ProcessError::TimedOut { .. })));
    }

    #[test]
    fn test_elapsed_ms_saturates() {
        let start = Instant::now();
        let later = start + Duration::from_millis(250);
        assert_eq!(elapsed_ms(start, later), 250.0);
        assert_eq!(elapsed_ms(later, start), 0.0);
    }
}
