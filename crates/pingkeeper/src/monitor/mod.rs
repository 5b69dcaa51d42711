//! The monitor loop drives one probe at a fixed cadence.
//!
//! Each tick probes the target, feeds the result to the [`HealthTracker`],
//! fires the hooks of the matching slot and publishes a [`TickEvent`]. Ticks
//! never overlap: the next one starts `interval` after the previous one
//! started, or immediately if the previous one ran late.
//!
//! A run ends when its duration elapses ([`LoopState::Stopped`]) or when the
//! cancellation token fires ([`LoopState::Cancelled`]). Invalid configuration
//! is rejected before the loop exists; [`RunSummary::failed`] gives callers the
//! same summary shape for that path.

mod events;

pub use events::{MonitorEvent, TickEvent};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ConfigError;
use crate::health::{AlertTransition, HealthTracker, Stats};
use crate::hooks::{ActionHook, run_hook};
use crate::probe::{Probe, ProbeConfig, ProbeOptions, build_probe};

use events::EventBus;

const EVENT_CAPACITY: usize = 256;

/// Scheduling and alerting settings of one monitor
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Total run length; `None` runs until cancelled
    pub duration: Option<Duration>,
    /// Consecutive failures that raise the alert
    pub max_failures: u32,
    /// Clear the alert on the first success after it was raised
    pub clear_on_recovery: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            duration: None,
            max_failures: 3,
            clear_on_recovery: true,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::NonPositiveInterval);
        }
        if self.max_failures == 0 {
            return Err(ConfigError::ZeroMaxFailures);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Running,
    /// The configured duration elapsed
    Stopped,
    /// The cancellation token fired
    Cancelled,
    /// The configuration was rejected, nothing ran
    Failed,
}

/// Final report of a run, identical in shape for every exit path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub target: String,
    pub state: LoopState,
    pub stats: Stats,
    pub alert_active: bool,
    pub consecutive_failures: u32,
    /// Set only for [`LoopState::Failed`]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn failed(target: impl Into<String>, error: &ConfigError) -> Self {
        Self {
            target: target.into(),
            state: LoopState::Failed,
            stats: Stats::default(),
            alert_active: false,
            consecutive_failures: 0,
            error: Some(error.to_string()),
        }
    }
}

pub struct MonitorLoop {
    config: MonitorConfig,
    probe: Box<dyn Probe>,
    tracker: HealthTracker,
    success_hooks: Vec<Arc<dyn ActionHook>>,
    failure_hooks: Vec<Arc<dyn ActionHook>>,
    state: LoopState,
    events: EventBus,
    stats_tx: watch::Sender<Stats>,
}

impl MonitorLoop {
    pub fn new(config: MonitorConfig, probe: Box<dyn Probe>) -> Result<Self, ConfigError> {
        config.validate()?;

        let tracker =
            HealthTracker::new(config.max_failures).clear_on_recovery(config.clear_on_recovery);
        let (stats_tx, _stats_rx) = watch::channel(Stats::default());

        Ok(Self {
            config,
            probe,
            tracker,
            success_hooks: Vec::new(),
            failure_hooks: Vec::new(),
            state: LoopState::Idle,
            events: EventBus::new(EVENT_CAPACITY),
            stats_tx,
        })
    }

    /// Validate `probe_config`, build the matching probe and wrap it in a loop
    pub fn for_target(
        config: MonitorConfig,
        probe_config: &ProbeConfig,
        options: &ProbeOptions,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        probe_config.validate()?;
        let probe = build_probe(probe_config, options)?;
        Self::new(config, probe)
    }

    /// Append a hook to the success slot. Hooks in a slot run in order.
    #[must_use]
    pub fn with_success_hook(mut self, hook: Arc<dyn ActionHook>) -> Self {
        self.success_hooks.push(hook);
        self
    }

    /// Append a hook to the failure slot
    #[must_use]
    pub fn with_failure_hook(mut self, hook: Arc<dyn ActionHook>) -> Self {
        self.failure_hooks.push(hook);
        self
    }

    pub fn target(&self) -> &str {
        self.probe.target()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Per-tick events followed by one final [`MonitorEvent::Finished`]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Latest statistics; each read yields a copy
    pub fn stats(&self) -> watch::Receiver<Stats> {
        self.stats_tx.subscribe()
    }

    /// Run until the duration elapses or `cancel` fires.
    ///
    /// Consumes the loop: one instance is one run.
    pub async fn run(mut self, cancel: CancellationToken) -> RunSummary {
        self.state = LoopState::Running;
        info!(
            target_host = %self.probe.target(),
            kind = %self.probe.kind(),
            interval = ?self.config.interval,
            duration = ?self.config.duration,
            max_failures = self.config.max_failures,
            "Monitor started"
        );

        let started = Instant::now();
        let mut tick: u64 = 0;

        self.state = loop {
            if cancel.is_cancelled() {
                break LoopState::Cancelled;
            }

            let tick_start = Instant::now();
            tick += 1;
            self.tick(tick).await;

            if let Some(duration) = self.config.duration {
                if started.elapsed() >= duration {
                    break LoopState::Stopped;
                }
            }

            // A late tick leaves a deadline in the past and fires right away
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break LoopState::Cancelled,
                _ = sleep_until(tick_start + self.config.interval) => {}
            }
        };

        let summary = self.summary();
        info!(
            target_host = %summary.target,
            state = ?summary.state,
            total = summary.stats.total,
            successful = summary.stats.successful,
            "Monitor finished"
        );
        self.events.publish(MonitorEvent::Finished(summary.clone()));
        summary
    }

    async fn tick(&mut self, tick: u64) {
        let result = self.probe.check().await;
        let transition = self.tracker.record(&result);
        let target = self.probe.target().to_string();

        match transition {
            AlertTransition::Entered => error!(
                target_host = %target,
                streak = self.tracker.consecutive_failures(),
                last_error = result.error.as_deref().unwrap_or_default(),
                "Target has failed {} times in a row",
                self.tracker.consecutive_failures()
            ),
            AlertTransition::Stayed => warn!(
                target_host = %target,
                streak = self.tracker.consecutive_failures(),
                "Target still failing"
            ),
            AlertTransition::Cleared => info!(target_host = %target, "Target recovered"),
            AlertTransition::None => {}
        }

        let hooks = if result.success { &self.success_hooks } else { &self.failure_hooks };
        let mut reports = Vec::with_capacity(hooks.len());
        for hook in hooks {
            reports.push(run_hook(hook.as_ref()).await);
        }

        self.stats_tx.send_replace(self.tracker.snapshot());

        self.events.publish(MonitorEvent::Tick(TickEvent {
            target,
            tick,
            timestamp: result.timestamp,
            success: result.success,
            latency_ms: result.latency_ms,
            error: result.error,
            alert_active: self.tracker.alert_active(),
            transition,
            consecutive_failures: self.tracker.consecutive_failures(),
            hooks: reports,
        }));
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            target: self.probe.target().to_string(),
            state: self.state,
            stats: self.tracker.snapshot(),
            alert_active: self.tracker.alert_active(),
            consecutive_failures: self.tracker.consecutive_failures(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::hooks::{HookOutcome, HookOutput};
    use crate::probe::ProbeKind;
    use crate::result::ProbeResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds on even calls, fails on odd ones, optionally taking its time
    struct AlternatingProbe {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl AlternatingProbe {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0), delay: Duration::ZERO }
        }
    }

    #[async_trait]
    impl Probe for AlternatingProbe {
        async fn check(&self) -> ProbeResult {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                ProbeResult::success(10.0)
            } else {
                ProbeResult::failure(1.0, "stub failure")
            }
        }

        fn kind(&self) -> ProbeKind {
            ProbeKind::Socket
        }

        fn target(&self) -> &str {
            "stub"
        }
    }

    struct DownProbe;

    #[async_trait]
    impl Probe for DownProbe {
        async fn check(&self) -> ProbeResult {
            ProbeResult::failure(1.0, "down")
        }

        fn kind(&self) -> ProbeKind {
            ProbeKind::Socket
        }

        fn target(&self) -> &str {
            "down"
        }
    }

    #[derive(Default)]
    struct CountingHook {
        runs: AtomicUsize,
        broken: bool,
    }

    #[async_trait]
    impl ActionHook for CountingHook {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        async fn run(&self) -> Result<HookOutput, HookError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                Err(HookError::ScriptNotFound("/gone.sh".into()))
            } else {
                Ok(HookOutput { exit_code: Some(0), ..HookOutput::default() })
            }
        }
    }

    fn config(interval_ms: u64, duration_ms: Option<u64>, max_failures: u32) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_millis(interval_ms),
            duration: duration_ms.map(Duration::from_millis),
            max_failures,
            clear_on_recovery: true,
        }
    }

    fn drain_ticks(
        rx: &mut broadcast::Receiver<MonitorEvent>,
    ) -> (Vec<TickEvent>, Option<RunSummary>) {
        let mut ticks = Vec::new();
        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                MonitorEvent::Tick(tick) => ticks.push(tick),
                MonitorEvent::Finished(summary) => finished = Some(summary),
            }
        }
        (ticks, finished)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = MonitorLoop::new(config(0, None, 3), Box::new(AlternatingProbe::new()));
        assert_eq!(result.err(), Some(ConfigError::NonPositiveInterval));

        let result = MonitorLoop::new(config(10, None, 0), Box::new(AlternatingProbe::new()));
        assert_eq!(result.err(), Some(ConfigError::ZeroMaxFailures));
    }

    #[test]
    fn test_for_target_rejects_unsupported_scheme() {
        let probe_config = ProbeConfig::new("ftp://example.com", Duration::from_secs(1));
        let result =
            MonitorLoop::for_target(config(10, None, 3), &probe_config, &ProbeOptions::default());

        let error = result.err().expect("ftp must be rejected");
        assert_eq!(error, ConfigError::UnsupportedScheme("ftp".to_string()));

        let summary = RunSummary::failed("ftp://example.com", &error);
        assert_eq!(summary.state, LoopState::Failed);
        assert_eq!(summary.stats, Stats::default());
        assert_eq!(summary.error.as_deref(), Some("Unsupported protocol: ftp"));
    }

    #[test]
    fn test_new_loop_is_idle() {
        let monitor =
            MonitorLoop::new(config(10, None, 3), Box::new(AlternatingProbe::new())).unwrap();
        assert_eq!(monitor.state(), LoopState::Idle);
        assert_eq!(monitor.target(), "stub");
        assert_eq!(monitor.config().interval, Duration::from_millis(10));
        assert_eq!(monitor.config().max_failures, 3);
    }

    #[tokio::test]
    async fn test_stops_after_duration() {
        let monitor =
            MonitorLoop::new(config(10, Some(50), 3), Box::new(AlternatingProbe::new())).unwrap();

        let started = std::time::Instant::now();
        let summary = monitor.run(CancellationToken::new()).await;

        assert_eq!(summary.state, LoopState::Stopped);
        assert!((4..=7).contains(&summary.stats.total), "total was {}", summary.stats.total);
        assert_eq!(summary.stats.successful + summary.stats.failed, summary.stats.total);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence_with_paused_clock() {
        let monitor =
            MonitorLoop::new(config(10, Some(50), 3), Box::new(AlternatingProbe::new())).unwrap();
        let summary = monitor.run(CancellationToken::new()).await;

        // Ticks at 0, 10, 20, 30, 40 and 50ms; the last one meets the duration
        assert_eq!(summary.state, LoopState::Stopped);
        assert_eq!(summary.stats.total, 6);
        assert_eq!(summary.stats.successful, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_ticks_fire_immediately_without_backlog() {
        let probe =
            AlternatingProbe { calls: AtomicUsize::new(0), delay: Duration::from_millis(25) };
        let monitor = MonitorLoop::new(config(10, Some(100), 3), Box::new(probe)).unwrap();

        let summary = monitor.run(CancellationToken::new()).await;

        // Each tick takes 25ms, so the 10ms cadence cannot be kept: four ticks
        // back to back, no catch-up burst
        assert_eq!(summary.stats.total, 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let monitor =
            MonitorLoop::new(config(10, None, 3), Box::new(AlternatingProbe::new())).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = monitor.run(cancel).await;
        assert_eq!(summary.state, LoopState::Cancelled);
        assert_eq!(summary.stats.total, 0);
        assert_eq!(summary.stats.success_rate, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_sleeping() {
        let monitor =
            MonitorLoop::new(config(1_000, None, 3), Box::new(AlternatingProbe::new())).unwrap();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            canceller.cancel();
        });

        let summary = monitor.run(cancel).await;
        assert_eq!(summary.state, LoopState::Cancelled);
        // Ticks at 0s, 1s and 2s
        assert_eq!(summary.stats.total, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hooks_follow_result() {
        let on_success = Arc::new(CountingHook::default());
        let on_failure = Arc::new(CountingHook { broken: true, ..CountingHook::default() });

        let monitor = MonitorLoop::new(config(10, Some(30), 3), Box::new(AlternatingProbe::new()))
            .unwrap()
            .with_success_hook(on_success.clone())
            .with_failure_hook(on_failure.clone());
        let mut rx = monitor.subscribe();

        let summary = monitor.run(CancellationToken::new()).await;

        // Ticks at 0, 10, 20, 30: success, failure, success, failure
        assert_eq!(summary.stats.total, 4);
        assert_eq!(on_success.runs.load(Ordering::SeqCst), 2);
        assert_eq!(on_failure.runs.load(Ordering::SeqCst), 2);

        let (ticks, finished) = drain_ticks(&mut rx);
        assert_eq!(ticks.len(), 4);
        assert!(ticks[0].hooks[0].succeeded());
        assert!(matches!(ticks[1].hooks[0].outcome, HookOutcome::Failed { .. }));
        assert_eq!(finished, Some(summary));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_readable_while_running() {
        let monitor =
            MonitorLoop::new(config(10, Some(30), 3), Box::new(AlternatingProbe::new())).unwrap();
        let mut stats_rx = monitor.stats();
        let mut previous: Stats = *stats_rx.borrow_and_update();
        assert_eq!(previous, Stats::default());

        let handle = tokio::spawn(monitor.run(CancellationToken::new()));

        // Ticks at 0, 10, 20 and 30ms, each publishing a fresh copy
        for expected in 1..=4 {
            stats_rx.changed().await.expect("loop still running");
            let current: Stats = *stats_rx.borrow_and_update();

            assert_eq!(current.total, expected);
            assert_eq!(current.successful + current.failed, expected);
            // The earlier copy is not touched by later ticks
            assert_eq!(previous.total, expected - 1);
            previous = current;
        }

        let summary = handle.await.unwrap();
        assert_eq!(summary.state, LoopState::Stopped);
        assert_eq!(summary.stats, previous);
        assert!(stats_rx.changed().await.is_err(), "sender is dropped after the run");
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_entered_once_and_reported() {
        let monitor = MonitorLoop::new(config(10, Some(40), 3), Box::new(DownProbe)).unwrap();
        let mut rx = monitor.subscribe();
        let stats = monitor.stats();

        let summary = monitor.run(CancellationToken::new()).await;
        let (ticks, _) = drain_ticks(&mut rx);

        let transitions: Vec<_> = ticks.iter().map(|t| t.transition).collect();
        assert_eq!(
            transitions,
            vec![
                AlertTransition::None,
                AlertTransition::None,
                AlertTransition::Entered,
                AlertTransition::Stayed,
                AlertTransition::Stayed,
            ]
        );
        assert!(!ticks[1].alert_active);
        assert!(ticks[2].alert_active);
        assert!(summary.alert_active);
        assert_eq!(summary.consecutive_failures, 5);
        assert_eq!(stats.borrow().failed, 5);
    }
}
