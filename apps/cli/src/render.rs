//! Terminal output: per-tick lines, alert banners and the final summary

use chrono::Local;
use crossterm::style::{StyledContent, Stylize};
use pingkeeper::{AlertTransition, HookOutcome, LoopState, RunSummary, TickEvent};
use serde::Serialize;
use tracing::warn;

use crate::cli::Settings;

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    verbose: bool,
    json: bool,
}

impl Printer {
    pub fn new(settings: &Settings) -> Self {
        Self { verbose: settings.verbose, json: settings.json }
    }

    pub fn banner(&self, target: &str, settings: &Settings) {
        if self.json {
            return;
        }
        for line in banner_lines(target, settings) {
            println!("{line}");
        }
    }

    pub fn tick(&self, event: &TickEvent) {
        if self.json {
            print_json(event);
            return;
        }
        for line in tick_lines(event, self.verbose) {
            println!("{line}");
        }
    }

    pub fn summary(&self, summary: &RunSummary) {
        if self.json {
            print_json(summary);
            return;
        }
        for line in summary_lines(summary) {
            println!("{line}");
        }
    }
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("Failed to serialize output: {e}"),
    }
}

pub fn banner_lines(target: &str, settings: &Settings) -> Vec<StyledContent<String>> {
    let mut lines = vec![
        format!("Starting pinger for {target}").green(),
        format!(
            "Interval: {:?}, Timeout: {:?}, Alert after {} failures",
            settings.interval, settings.timeout, settings.max_failures
        )
        .cyan(),
    ];

    if let Some(size) = settings.payload_size {
        lines.push(format!("Packet size: {size} bytes").cyan());
    }
    if let Some(command) = &settings.success_cmd {
        lines.push(format!("Success command: {command}").cyan());
    }
    if let Some(command) = &settings.failure_cmd {
        lines.push(format!("Failure command: {command}").cyan());
    }
    if let Some(script) = &settings.success_script {
        lines.push(format!("Success script: {}", script.display()).cyan());
    }
    if let Some(script) = &settings.failure_script {
        lines.push(format!("Failure script: {}", script.display()).cyan());
    }
    lines.push("Press Ctrl+C to stop\n".to_string().yellow());

    lines
}

/// Failures are always shown; successes only when verbose
pub fn tick_lines(event: &TickEvent, verbose: bool) -> Vec<StyledContent<String>> {
    let mut lines = Vec::new();
    let time = event.timestamp.with_timezone(&Local).format("%H:%M:%S");

    if event.success && verbose {
        lines.push(format!("[{time}] ✓ {} - {:.2}ms", event.target, event.latency_ms).green());
    } else if !event.success {
        let error = event.error.as_deref().unwrap_or("unknown error");
        lines.push(format!("[{time}] ✗ {} - Failed: {error}", event.target).red());
    }

    if verbose {
        for report in &event.hooks {
            let line = match &report.outcome {
                HookOutcome::Completed(output) => format!(
                    "{} exited with {}: {}",
                    report.hook,
                    output.exit_code.map_or_else(|| "signal".to_string(), |code| code.to_string()),
                    output.stdout.trim()
                ),
                HookOutcome::Failed { error } => format!("{} failed: {error}", report.hook),
            };
            lines.push(if event.success { line.blue() } else { line.yellow() });
        }
    }

    match event.transition {
        AlertTransition::Entered | AlertTransition::Stayed => {
            lines.push(
                format!(
                    "\n⚠️  ALERT: {} has failed {} times in a row!",
                    event.target, event.consecutive_failures
                )
                .red(),
            );
            let error = event.error.as_deref().unwrap_or("unknown error");
            lines.push(format!("Last error: {error}\n").red());
        }
        AlertTransition::Cleared => {
            lines.push(format!("✓ {} recovered, alert cleared", event.target).green());
        }
        AlertTransition::None => {}
    }

    lines
}

pub fn summary_lines(summary: &RunSummary) -> Vec<StyledContent<String>> {
    let stats = &summary.stats;
    let mut lines = vec![
        "\n--- Pinger Summary ---".to_string().cyan(),
        format!("Target: {}", summary.target).white(),
    ];

    match summary.state {
        LoopState::Failed => {
            let error = summary.error.as_deref().unwrap_or("invalid configuration");
            lines.push(format!("Not started: {error}").red());
        }
        LoopState::Cancelled => lines.push("Pinger stopped by user".to_string().yellow()),
        LoopState::Stopped | LoopState::Idle | LoopState::Running => {}
    }

    lines.push(format!("Total pings: {}", stats.total).white());

    let rate = format!("Successful: {} ({:.1}%)", stats.successful, stats.success_rate);
    lines.push(if stats.success_rate > 80.0 {
        rate.green()
    } else if stats.success_rate > 50.0 {
        rate.yellow()
    } else {
        rate.red()
    });

    let failed = format!("Failed: {}", stats.failed);
    lines.push(if stats.failed > 0 { failed.red() } else { failed.green() });
    lines.push(format!("Average response time: {:.2}ms", stats.avg_latency).cyan());

    if stats.successful > 0 {
        lines.push(format!("Min response time: {:.2}ms", stats.min_latency).green());
        let max = format!("Max response time: {:.2}ms", stats.max_latency);
        lines.push(if stats.max_latency > 500.0 { max.yellow() } else { max.green() });
    }

    if summary.alert_active {
        lines.push(
            format!("Alert still active ({} consecutive failures)", summary.consecutive_failures)
                .red(),
        );
    }

    lines
}
