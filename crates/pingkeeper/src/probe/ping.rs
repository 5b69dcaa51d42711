//! External ping probing
//!
//! Sends one echo through the platform ping utility and reads the round trip
//! out of its text output. When the output carries no timing figure, the
//! wall-clock time of the whole invocation is reported instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Probe, ProbeKind};
use crate::process::{Clock, Invocation, ProcessRunner, SystemClock, TokioProcessRunner, elapsed_ms};
use crate::result::ProbeResult;

pub const DEFAULT_PING_PROGRAM: &str = "ping";

/// Extra time granted to the utility on top of its own timeout before the
/// process is killed
const PROCESS_GRACE: Duration = Duration::from_secs(2);

pub struct ExternalPingProbe {
    host: String,
    timeout: Duration,
    payload_size: Option<u32>,
    program: String,
    runner: Arc<dyn ProcessRunner>,
    clock: Arc<dyn Clock>,
}

impl ExternalPingProbe {
    pub fn new(host: impl Into<String>, timeout: Duration, payload_size: Option<u32>) -> Self {
        Self {
            host: host.into(),
            timeout,
            payload_size,
            program: DEFAULT_PING_PROGRAM.to_string(),
            runner: Arc::new(TokioProcessRunner),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// One echo, the configured timeout and payload, in the local dialect
    pub fn invocation(&self) -> Invocation {
        let mut invocation = Invocation::new(&self.program);

        if cfg!(windows) {
            invocation = invocation.arg("-n").arg("1");
            if let Some(size) = self.payload_size {
                invocation = invocation.arg("-l").arg(size.to_string());
            }
            invocation = invocation.arg("-w").arg(self.timeout.as_millis().to_string());
        } else {
            invocation = invocation.arg("-c").arg("1");
            if let Some(size) = self.payload_size {
                invocation = invocation.arg("-s").arg(size.to_string());
            }
            invocation = invocation.arg("-W").arg(wait_arg(self.timeout));
        }

        invocation.arg(&self.host)
    }
}

/// `-W` is milliseconds on macOS and the BSDs, whole seconds on Linux
fn wait_arg(timeout: Duration) -> String {
    if cfg!(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    )) {
        timeout.as_millis().max(1).to_string()
    } else {
        let seconds = timeout.as_secs_f64().ceil().max(1.0) as u64;
        seconds.to_string()
    }
}

/// Extract the round trip from ping output.
///
/// Looks for the first `time=` or `time<` token and reads the number after
/// it, with or without an `ms` suffix.
pub fn parse_latency_ms(output: &str) -> Option<f64> {
    output.lines().find_map(|line| {
        let start = line.find("time=").or_else(|| line.find("time<"))?;
        let token = line[start + 5..].split_whitespace().next()?;
        let number = token.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');
        number.parse::<f64>().ok().filter(|value| value.is_finite() && *value >= 0.0)
    })
}

#[async_trait]
impl Probe for ExternalPingProbe {
    async fn check(&self) -> ProbeResult {
        let invocation = self.invocation();
        debug!(command = %invocation, "External ping probe");

        let start = self.clock.now();
        let outcome = self.runner.run(&invocation, Some(self.timeout + PROCESS_GRACE)).await;
        let elapsed = elapsed_ms(start, self.clock.now());

        match outcome {
            Ok(output) if output.success() => {
                let latency = parse_latency_ms(&output.stdout).unwrap_or_else(|| {
                    debug!("No timing in ping output, using elapsed {:.2}ms", elapsed);
                    elapsed
                });
                ProbeResult::success(latency)
            }
            Ok(output) => {
                let stderr = output.stderr.trim();
                let error = if stderr.is_empty() {
                    match output.exit_code {
                        Some(code) => format!("Ping failed (exit code {code})"),
                        None => "Ping failed (terminated by signal)".to_string(),
                    }
                } else {
                    stderr.to_string()
                };
                debug!("External ping to {} failed: {}", self.host, error);
                ProbeResult::failure(elapsed, error)
            }
            Err(process_error) => {
                debug!("External ping to {} could not run: {}", self.host, process_error);
                ProbeResult::failure(elapsed, process_error.to_string())
            }
        }
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::ExternalPing
    }

    fn target(&self) -> &str {
        &self.host
    }
}
