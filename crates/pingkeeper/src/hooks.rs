//! Action hooks fired after each tick
//!
//! A hook is an external side effect: a shell command line or a script file.
//! Hooks report their output, including non-zero exits, and only fail when the
//! process could not be run at all. Callers go through [`run_hook`], which
//! turns every failure into a [`HookReport`] so that the monitor loop never
//! stops because of a hook.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::HookError;
use crate::process::{CommandOutput, Invocation, ProcessRunner, TokioProcessRunner};

pub type HookOutput = CommandOutput;

pub const DEFAULT_INTERPRETER: &str = "bash";

#[async_trait]
pub trait ActionHook: Send + Sync {
    /// Short label for logs and reports
    fn describe(&self) -> String;

    async fn run(&self) -> Result<HookOutput, HookError>;
}

/// Runs a command line through the platform shell
pub struct CommandHook {
    command: String,
    timeout: Option<Duration>,
    runner: Arc<dyn ProcessRunner>,
}

impl CommandHook {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), timeout: None, runner: Arc::new(TokioProcessRunner) }
    }

    /// Kill the command if it runs longer than `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }
}

#[async_trait]
impl ActionHook for CommandHook {
    fn describe(&self) -> String {
        format!("command `{}`", self.command)
    }

    async fn run(&self) -> Result<HookOutput, HookError> {
        let output = self.runner.run(&Invocation::shell(&self.command), self.timeout).await?;
        Ok(output)
    }
}

/// Runs a script file through an interpreter (`bash` unless told otherwise)
pub struct ScriptHook {
    path: PathBuf,
    interpreter: String,
    timeout: Option<Duration>,
    runner: Arc<dyn ProcessRunner>,
}

impl ScriptHook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            timeout: None,
            runner: Arc::new(TokioProcessRunner),
        }
    }

    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = tokio::fs::metadata(path).await?.permissions();
    let mode = permissions.mode();
    if mode & 0o755 != 0o755 {
        permissions.set_mode(mode | 0o755);
        tokio::fs::set_permissions(path, permissions).await?;
    }
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl ActionHook for ScriptHook {
    fn describe(&self) -> String {
        format!("script {}", self.path.display())
    }

    async fn run(&self) -> Result<HookOutput, HookError> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Err(HookError::ScriptNotFound(self.path.clone()));
        }

        make_executable(&self.path)
            .await
            .map_err(|source| HookError::Permissions { path: self.path.clone(), source })?;

        let invocation =
            Invocation::new(&self.interpreter).arg(self.path.to_string_lossy().into_owned());
        let output = self.runner.run(&invocation, self.timeout).await?;
        Ok(output)
    }
}

/// Does nothing and succeeds
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

#[async_trait]
impl ActionHook for NoopHook {
    fn describe(&self) -> String {
        "noop".to_string()
    }

    async fn run(&self) -> Result<HookOutput, HookError> {
        Ok(HookOutput { exit_code: Some(0), ..HookOutput::default() })
    }
}

/// What happened when a hook was fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HookOutcome {
    /// The process ran; check `exit_code` for its verdict
    Completed(HookOutput),
    /// The process could not be run
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookReport {
    pub hook: String,
    #[serde(flatten)]
    pub outcome: HookOutcome,
}

impl HookReport {
    /// True when the hook ran and exited with status 0
    pub fn succeeded(&self) -> bool {
        matches!(&self.outcome, HookOutcome::Completed(output) if output.success())
    }
}

/// Run a hook and convert any failure into a report
pub async fn run_hook(hook: &dyn ActionHook) -> HookReport {
    let name = hook.describe();
    debug!("Running hook {}", name);

    let outcome = match hook.run().await {
        Ok(output) => {
            if !output.success() {
                warn!(exit_code = ?output.exit_code, "Hook {} exited unsuccessfully", name);
            }
            HookOutcome::Completed(output)
        }
        Err(e) => {
            warn!("Hook {} failed: {}", name, e);
            HookOutcome::Failed { error: e.to_string() }
        }
    };

    HookReport { hook: name, outcome }
}
