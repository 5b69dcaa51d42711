//! Probe-and-alert engine
//!
//! `pingkeeper` repeatedly checks whether a remote endpoint is reachable,
//! turns the noisy individual results into an alert state and fires
//! user-supplied hooks on every outcome.
//!
//! - [`probe`]: TCP, HTTP and external ping strategies behind the [`Probe`] trait
//! - [`health`]: consecutive failure tracking and [`Stats`]
//! - [`hooks`]: command and script side effects
//! - [`monitor`]: the scheduling loop tying it all together
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pingkeeper::{CommandHook, MonitorConfig, MonitorLoop, ProbeConfig, ProbeOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), pingkeeper::ConfigError> {
//! let probe = ProbeConfig::new("https://example.com", Duration::from_secs(2));
//! let config = MonitorConfig { duration: Some(Duration::from_secs(60)), ..Default::default() };
//!
//! let summary = MonitorLoop::for_target(config, &probe, &ProbeOptions::default())?
//!     .with_failure_hook(Arc::new(CommandHook::new("logger 'example.com is down'")))
//!     .run(CancellationToken::new())
//!     .await;
//!
//! println!("{} checks, {:.1}% up", summary.stats.total, summary.stats.success_rate);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod health;
pub mod hooks;
pub mod monitor;
pub mod probe;
pub mod process;
pub mod result;

pub use error::{ConfigError, HookError, ProcessError};
pub use health::{AlertTransition, HealthTracker, Stats};
pub use hooks::{
    ActionHook, CommandHook, HookOutcome, HookOutput, HookReport, NoopHook, ScriptHook, run_hook,
};
pub use monitor::{LoopState, MonitorConfig, MonitorEvent, MonitorLoop, RunSummary, TickEvent};
pub use probe::{
    ExternalPingProbe, HttpProbe, HttpTransport, Probe, ProbeConfig, ProbeKind, ProbeOptions,
    ReqwestTransport, TcpProbe, build_probe,
};
pub use process::{Clock, CommandOutput, Invocation, ProcessRunner, SystemClock, TokioProcessRunner};
pub use result::ProbeResult;
