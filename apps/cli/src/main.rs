#![warn(clippy::all, clippy::pedantic)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use pingkeeper::{
    ActionHook, CommandHook, MonitorConfig, MonitorEvent, MonitorLoop, ProbeConfig, ProbeOptions,
    RunSummary, ScriptHook,
};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod cli;
mod config;
mod render;

use cli::{Args, Settings};
use config::Config;
use render::Printer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.verbose);

    let config = load_config(&args)?;
    debug!("{config}");
    let settings = Settings::resolve(&args, &config);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping monitors");
            ctrl_c.cancel();
        }
    });

    let printer = Printer::new(&settings);
    let runs = settings
        .targets
        .iter()
        .map(|target| run_target(target, &settings, printer, cancel.child_token()));
    let summaries = join_all(runs).await;

    for summary in &summaries {
        printer.summary(summary);
    }

    Ok(())
}

/// An explicit `--config` must load; the default location falls back to
/// built-in defaults when it cannot be read or created
fn load_config(args: &Args) -> Result<Config> {
    match &args.config {
        Some(path) => Config::from_config(Some(path))
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(Config::from_config(None::<&std::path::Path>).unwrap_or_else(|e| {
            warn!("Using built-in defaults: {e}");
            Config::default()
        })),
    }
}

fn build_hooks(settings: &Settings) -> (Vec<Arc<dyn ActionHook>>, Vec<Arc<dyn ActionHook>>) {
    let command = |line: &String| {
        let hook = CommandHook::new(line.clone());
        let hook = match settings.hook_timeout {
            Some(timeout) => hook.with_timeout(timeout),
            None => hook,
        };
        Arc::new(hook) as Arc<dyn ActionHook>
    };
    let script = |path: &std::path::PathBuf| {
        let hook = ScriptHook::new(path.clone()).with_interpreter(settings.interpreter.clone());
        let hook = match settings.hook_timeout {
            Some(timeout) => hook.with_timeout(timeout),
            None => hook,
        };
        Arc::new(hook) as Arc<dyn ActionHook>
    };

    let success = settings
        .success_cmd
        .iter()
        .map(command)
        .chain(settings.success_script.iter().map(script))
        .collect();
    let failure = settings
        .failure_cmd
        .iter()
        .map(command)
        .chain(settings.failure_script.iter().map(script))
        .collect();

    (success, failure)
}

async fn run_target(
    target: &str,
    settings: &Settings,
    printer: Printer,
    cancel: CancellationToken,
) -> RunSummary {
    let mut probe_config = ProbeConfig::new(target, settings.timeout);
    if let Some(size) = settings.payload_size {
        probe_config = probe_config.with_payload_size(size);
    }

    let monitor_config = MonitorConfig {
        interval: settings.interval,
        duration: settings.duration,
        max_failures: settings.max_failures,
        clear_on_recovery: settings.clear_on_recovery,
    };
    let options =
        ProbeOptions { ping_program: settings.ping_program.clone(), ..ProbeOptions::default() };

    let mut monitor = match MonitorLoop::for_target(monitor_config, &probe_config, &options) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!(target_host = %target, "Invalid configuration: {e}");
            return RunSummary::failed(target, &e);
        }
    };

    let (success_hooks, failure_hooks) = build_hooks(settings);
    for hook in success_hooks {
        monitor = monitor.with_success_hook(hook);
    }
    for hook in failure_hooks {
        monitor = monitor.with_failure_hook(hook);
    }

    printer.banner(target, settings);

    let mut events = monitor.subscribe();
    let renderer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(MonitorEvent::Tick(tick)) => printer.tick(&tick),
                Ok(MonitorEvent::Finished(_)) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Output fell behind, {skipped} events skipped");
                }
            }
        }
    });

    let summary = monitor.run(cancel).await;
    if let Err(e) = renderer.await {
        warn!("Renderer task failed: {e}");
    }

    summary
}
