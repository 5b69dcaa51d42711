use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "pingkeeper",
    version,
    about = "Monitor connections and run commands when they come and go"
)]
pub struct Args {
    /// Hosts, IPs or URLs to monitor
    #[arg(required_unless_present = "preset")]
    pub targets: Vec<String>,

    /// Seconds between checks
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// Seconds before a single check gives up
    #[arg(short, long)]
    pub timeout: Option<f64>,

    /// Stop after this many seconds (runs until Ctrl+C otherwise)
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Consecutive failures before alerting
    #[arg(short = 'f', long)]
    pub max_failures: Option<u32>,

    /// Print every result, not just failures
    #[arg(short, long)]
    pub verbose: bool,

    /// Payload size in bytes; switches to the external ping utility
    #[arg(short, long)]
    pub packet_size: Option<u32>,

    /// Shell command to run after a successful check
    #[arg(short = 's', long)]
    pub success_cmd: Option<String>,

    /// Shell command to run after a failed check
    #[arg(short = 'F', long)]
    pub failure_cmd: Option<String>,

    /// Script to run after a successful check
    #[arg(short = 'S', long)]
    pub success_script: Option<PathBuf>,

    /// Script to run after a failed check
    #[arg(short = 'X', long)]
    pub failure_script: Option<PathBuf>,

    /// Canned speed test target
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// Keep the alert raised after the target recovers
    #[arg(long)]
    pub keep_alert: bool,

    /// Print events and summaries as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/pingkeeper/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// YouTube server 74.125.24.91, 9000 byte payload
    YoutubePrimary,
    /// YouTube server 172.217.194.113, 9000 byte payload
    YoutubeSecondary,
    /// Google DNS, 1000 byte payload
    GoogleDns,
    /// Google DNS, 3000 byte payload
    GoogleDnsHigh,
    /// Google DNS, 9000 byte payload
    GoogleDnsMax,
}

impl Preset {
    pub fn target(self) -> &'static str {
        match self {
            Preset::YoutubePrimary => "74.125.24.91",
            Preset::YoutubeSecondary => "172.217.194.113",
            Preset::GoogleDns | Preset::GoogleDnsHigh | Preset::GoogleDnsMax => "8.8.8.8",
        }
    }

    pub fn payload_size(self) -> u32 {
        match self {
            Preset::GoogleDns => 1000,
            Preset::GoogleDnsHigh => 3000,
            Preset::YoutubePrimary | Preset::YoutubeSecondary | Preset::GoogleDnsMax => 9000,
        }
    }

    pub fn interval(self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Effective run settings: CLI flags over preset over config file
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub targets: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub duration: Option<Duration>,
    pub max_failures: u32,
    pub payload_size: Option<u32>,
    pub clear_on_recovery: bool,
    pub verbose: bool,
    pub json: bool,
    pub success_cmd: Option<String>,
    pub failure_cmd: Option<String>,
    pub success_script: Option<PathBuf>,
    pub failure_script: Option<PathBuf>,
    pub ping_program: String,
    pub interpreter: String,
    pub hook_timeout: Option<Duration>,
}

/// Negative or non-finite values become zero and are rejected later by the
/// monitor's own validation
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl Settings {
    pub fn resolve(args: &Args, config: &Config) -> Self {
        let mut targets = args.targets.clone();
        if let Some(preset) = args.preset {
            targets.push(preset.target().to_string());
        }

        let interval = match (args.interval, args.preset) {
            (Some(interval), _) => seconds(interval),
            (None, Some(preset)) => preset.interval(),
            (None, None) => seconds(config.monitor.interval_secs),
        };

        Self {
            targets,
            interval,
            timeout: seconds(args.timeout.unwrap_or(config.monitor.timeout_secs)),
            duration: args.duration.map(seconds),
            max_failures: args.max_failures.unwrap_or(config.monitor.max_failures),
            payload_size: args.packet_size.or(args.preset.map(Preset::payload_size)),
            clear_on_recovery: config.monitor.clear_on_recovery && !args.keep_alert,
            verbose: args.verbose || args.preset.is_some(),
            json: args.json,
            success_cmd: args.success_cmd.clone(),
            failure_cmd: args.failure_cmd.clone(),
            success_script: args.success_script.clone(),
            failure_script: args.failure_script.clone(),
            ping_program: config.ping.program.clone(),
            interpreter: config.hooks.interpreter.clone(),
            hook_timeout: config.hooks.timeout_secs.map(seconds),
        }
    }
}
