use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single reachability check.
///
/// Failed checks still carry the measured elapsed time in `latency_ms`; it is
/// not a round-trip figure in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Whether the target answered the way the probe expects
    pub success: bool,

    /// Round-trip or elapsed time in milliseconds, never negative
    pub latency_ms: f64,

    /// Wall-clock time the check completed
    pub timestamp: DateTime<Utc>,

    /// Why the check failed; always `None` on success
    pub error: Option<String>,
}

impl ProbeResult {
    /// A successful check with the given latency
    pub fn success(latency_ms: f64) -> Self {
        Self {
            success: true,
            latency_ms: clamp_latency(latency_ms),
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// A failed check. An empty message is replaced so that failures always
    /// explain themselves.
    pub fn failure(latency_ms: f64, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "check failed".to_string();
        }

        Self {
            success: false,
            latency_ms: clamp_latency(latency_ms),
            timestamp: Utc::now(),
            error: Some(error),
        }
    }
}

fn clamp_latency(latency_ms: f64) -> f64 {
    if latency_ms.is_finite() && latency_ms > 0.0 { latency_ms } else { 0.0 }
}
