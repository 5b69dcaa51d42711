use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use super::RunSummary;
use crate::health::AlertTransition;
use crate::hooks::HookReport;

/// Observable record of one tick
#[derive(Debug, Clone, Serialize)]
pub struct TickEvent {
    pub target: String,
    /// 1-based tick counter
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub latency_ms: f64,
    pub error: Option<String>,
    pub alert_active: bool,
    pub transition: AlertTransition,
    pub consecutive_failures: u32,
    /// Reports of the hooks fired for this tick, in slot order
    pub hooks: Vec<HookReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    Tick(TickEvent),
    /// Last event of a run, sent on every exit path
    Finished(RunSummary),
}

/// Per-loop broadcast channel. Each monitor owns its own bus so that
/// concurrent monitors never share state.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, event: MonitorEvent) {
        // No receivers is fine, nobody is watching
        if self.tx.send(event).is_err() {
            trace!("Monitor event dropped, no subscribers");
        }
    }
}
