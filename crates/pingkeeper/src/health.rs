//! Failure streak tracking and aggregate statistics

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::result::ProbeResult;

/// How a recorded result changed the alert state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTransition {
    /// Nothing changed
    None,
    /// The streak just reached the threshold
    Entered,
    /// Another failure while the alert was already active
    Stayed,
    /// A success ended an active alert
    Cleared,
}

/// Point-in-time copy of the accumulated statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Percentage in `0..=100`, 0 when nothing was recorded
    pub success_rate: f64,
    /// Mean latency of successful checks, 0 when there were none
    pub avg_latency: f64,
    pub min_latency: f64,
    pub max_latency: f64,
}

/// Converts individual probe results into an alert state.
///
/// The alert enters once, when the consecutive failure count reaches
/// `max_failures` exactly. By default a success clears it again; with
/// `clear_on_recovery(false)` it stays latched until [`clear_alert`] is called.
///
/// [`clear_alert`]: HealthTracker::clear_alert
#[derive(Debug, Clone)]
pub struct HealthTracker {
    max_failures: u32,
    clear_on_recovery: bool,
    total: u64,
    successful: u64,
    consecutive_failures: u32,
    response_times: Vec<f64>,
    alert_active: bool,
}

impl HealthTracker {
    /// `max_failures` below 1 is treated as 1
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures: max_failures.max(1),
            clear_on_recovery: true,
            total: 0,
            successful: 0,
            consecutive_failures: 0,
            response_times: Vec::new(),
            alert_active: false,
        }
    }

    #[must_use]
    pub fn clear_on_recovery(mut self, clear: bool) -> Self {
        self.clear_on_recovery = clear;
        self
    }

    pub fn record(&mut self, result: &ProbeResult) -> AlertTransition {
        self.total += 1;

        if result.success {
            self.successful += 1;
            self.response_times.push(result.latency_ms);
            self.consecutive_failures = 0;

            if self.alert_active && self.clear_on_recovery {
                self.alert_active = false;
                debug!("Alert cleared after recovery");
                return AlertTransition::Cleared;
            }
            return AlertTransition::None;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.alert_active {
            AlertTransition::Stayed
        } else if self.consecutive_failures == self.max_failures {
            self.alert_active = true;
            debug!(streak = self.consecutive_failures, "Alert entered");
            AlertTransition::Entered
        } else {
            AlertTransition::None
        }
    }

    /// Reset the alert flag without touching counters. Returns whether an
    /// alert was active.
    pub fn clear_alert(&mut self) -> bool {
        std::mem::replace(&mut self.alert_active, false)
    }

    pub fn alert_active(&self) -> bool {
        self.alert_active
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn response_times(&self) -> &[f64] {
        &self.response_times
    }

    pub fn snapshot(&self) -> Stats {
        let failed = self.total - self.successful;
        let success_rate = if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64 * 100.0
        };

        let (avg_latency, min_latency, max_latency) = if self.response_times.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = self.response_times.iter().sum();
            let min = self.response_times.iter().copied().fold(f64::INFINITY, f64::min);
            let max = self.response_times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (sum / self.response_times.len() as f64, min, max)
        };

        Stats {
            total: self.total,
            successful: self.successful,
            failed,
            success_rate,
            avg_latency,
            min_latency,
            max_latency,
        }
    }
}
