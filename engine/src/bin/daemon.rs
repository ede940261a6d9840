// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! supervisord: runs the worker fleet described by the apps file.
//!
//! SIGHUP reloads the apps file, SIGUSR1 logs a JSON status line per
//! worker, SIGTERM/SIGINT stop every worker and exit. Reloads run in the
//! background so a long rolling restart never delays signal handling.

#[path = "daemon/config.rs"]
mod config;

use anyhow::{Context, Result};
use config::DaemonConfig;
use std::path::Path;
use std::sync::Arc;
use supervisor_engine::{
    load_apps, FileLogSink, LogSink, Supervisor, TokioLauncher, TracingLogSink,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        apps_file = %config.apps_file.display(),
        "supervisord starting"
    );

    let file_sink = match &config.log_dir {
        Some(dir) => Some(Arc::new(
            FileLogSink::new(dir).context("setting up worker log directory")?,
        )),
        None => None,
    };
    let sink: Arc<dyn LogSink> = match &file_sink {
        Some(sink) => Arc::clone(sink) as Arc<dyn LogSink>,
        None => Arc::new(TracingLogSink),
    };
    let supervisor = Supervisor::new(
        Arc::new(TokioLauncher::new(sink)),
        config.supervisor_config(),
    );

    let specs = load_apps(&config.apps_file)
        .with_context(|| format!("loading {}", config.apps_file.display()))?;
    let summary = supervisor.apply(specs).await?;
    info!(specs = summary.added.len(), "Workers launched");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;

    let shutting_down = CancellationToken::new();
    let mut reloading: Option<JoinHandle<()>> = None;
    let mut reload_queued = false;

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                info!("received SIGHUP, reloading");
                if let Some(sink) = &file_sink {
                    sink.reopen();
                }
                if reloading.is_some() {
                    info!("Reload already in progress, queueing another");
                    reload_queued = true;
                } else {
                    reloading = Some(spawn_reload(&supervisor, &config.apps_file, &shutting_down));
                }
            }
            joined = wait_reload(&mut reloading), if reloading.is_some() => {
                reloading = None;
                if let Err(e) = joined {
                    error!(error = %e, "Reload task failed");
                }
                if reload_queued {
                    reload_queued = false;
                    reloading = Some(spawn_reload(&supervisor, &config.apps_file, &shutting_down));
                }
            }
            _ = sigusr1.recv() => log_status(&supervisor),
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
                break;
            }
        }
    }

    shutting_down.cancel();
    supervisor.shutdown().await;
    if let Some(in_flight) = reloading {
        // anything the reload launched before it saw the shutdown
        if let Err(e) = in_flight.await {
            error!(error = %e, "Reload task failed");
        }
        supervisor.shutdown().await;
    }
    info!("supervisord stopped");
    Ok(())
}

fn spawn_reload(
    supervisor: &Supervisor,
    apps_file: &Path,
    shutting_down: &CancellationToken,
) -> JoinHandle<()> {
    let supervisor = supervisor.clone();
    let apps_file = apps_file.to_path_buf();
    let shutting_down = shutting_down.clone();
    tokio::spawn(async move { reload(&supervisor, &apps_file, &shutting_down).await })
}

async fn wait_reload(reloading: &mut Option<JoinHandle<()>>) -> Result<(), JoinError> {
    match reloading {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Re-read the apps file and converge on it. A bad file keeps the running set.
async fn reload(supervisor: &Supervisor, apps_file: &Path, shutting_down: &CancellationToken) {
    let specs = match load_apps(apps_file) {
        Ok(specs) => specs,
        Err(e) => {
            error!(error = %e, "Reload failed, keeping current workers");
            return;
        }
    };
    if shutting_down.is_cancelled() {
        info!("Shutting down, reload skipped");
        return;
    }
    match supervisor.apply(specs).await {
        Ok(summary) => info!(
            added = ?summary.added,
            changed = ?summary.changed,
            removed = ?summary.removed,
            "Reload applied"
        ),
        Err(e) => error!(error = %e, "Reload rejected, keeping current workers"),
    }
}

fn log_status(supervisor: &Supervisor) {
    for snapshot in supervisor.status() {
        match serde_json::to_string(&snapshot) {
            Ok(line) => info!(target: "status", "{}", line),
            Err(e) => warn!(worker = %snapshot.name, error = %e, "Cannot encode status"),
        }
    }
}
