// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Tokio Launcher
//! Real implementation of the Launcher port using `tokio::process`
//!
//! Each worker runs in its own process group so that stop signals also
//! reach children of an interpreter. stdout/stderr are drained line by
//! line into a `LogSink` so a chatty worker can never block on a full pipe.

use crate::constants::MAX_OUTPUT_LINE;
use crate::domain::ports::{
    ExitFuture, LaunchRequest, LaunchedProcess, Launcher, LogSink, OutputStream, StopSignal,
};
use crate::domain::{
    ExitStatus, Interpreter, LaunchCause, LaunchError, Result, SupervisorError, WorkerId,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

#[cfg(unix)]
use std::os::unix::process::CommandExt;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

pub struct TokioLauncher {
    sink: Arc<dyn LogSink>,
}

impl TokioLauncher {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Find an interpreter by path or by name on `PATH`.
    fn resolve_interpreter(name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        if candidate.components().count() > 1 {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }

        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(name))
            .find(|full| full.is_file())
    }

    fn build_command(request: &LaunchRequest) -> std::result::Result<Command, LaunchError> {
        let spec = &request.spec;
        let fail = |cause| LaunchError::new(spec.name(), request.instance, cause);

        let mut cmd = match spec.interpreter() {
            Interpreter::None => std::process::Command::new(spec.command()),
            Interpreter::Named(name) => {
                let path = Self::resolve_interpreter(name)
                    .ok_or_else(|| fail(LaunchCause::InterpreterNotFound(name.clone())))?;
                let mut cmd = std::process::Command::new(path);
                cmd.arg(spec.command());
                cmd
            }
        };
        cmd.args(spec.args());

        if let Some(dir) = spec.cwd() {
            if !dir.is_dir() {
                return Err(fail(LaunchCause::Io(format!(
                    "working directory {} does not exist",
                    dir.display()
                ))));
            }
            cmd.current_dir(dir);
        }

        let env = request.env();
        debug!(count = env.len(), "Setting environment variables");
        cmd.envs(env);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        #[cfg(unix)]
        cmd.process_group(0);

        let mut cmd = Command::from(cmd);
        cmd.kill_on_drop(false);
        Ok(cmd)
    }

    fn forward_output<R>(&self, reader: R, worker: WorkerId, stream: OutputStream)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = Vec::new();
            loop {
                line.clear();
                // a line longer than the cap is forwarded in pieces
                let mut capped = (&mut reader).take(MAX_OUTPUT_LINE as u64);
                match capped.read_until(b'\n', &mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        if line.last() == Some(&b'\n') {
                            line.pop();
                        }
                        sink.write_line(&worker, stream, &line);
                    }
                    Err(e) => {
                        warn!(worker = %worker, %stream, error = %e, "Failed to read worker output");
                        break;
                    }
                }
            }
        });
    }

    /// Wait for the child on its own task and hand the result back through
    /// a oneshot, so the wait continues even if the caller goes away.
    fn create_exit_future(mut child: Child, pid: u32) -> ExitFuture {
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = match child.wait().await {
                Ok(status) => {
                    let status = ExitStatus::from(status);
                    debug!(pid, %status, "Process exited");
                    Ok(status)
                }
                Err(e) => {
                    error!(pid, error = %e, "Failed to wait for process");
                    Err(SupervisorError::WaitFailed {
                        pid,
                        reason: e.to_string(),
                    })
                }
            };
            let _ = tx.send(result);
        });

        Box::pin(async move {
            rx.await.unwrap_or_else(|_| {
                Err(SupervisorError::WaitFailed {
                    pid,
                    reason: "process monitor task died unexpectedly".to_string(),
                })
            })
        })
    }
}

#[async_trait]
impl Launcher for TokioLauncher {
    async fn launch(
        &self,
        request: LaunchRequest,
    ) -> std::result::Result<LaunchedProcess, LaunchError> {
        let worker = request.worker_id();
        info!(
            worker = %worker,
            command = %request.spec.command(),
            args = ?request.spec.args(),
            interpreter = %request.spec.interpreter(),
            "Spawning worker"
        );

        let mut cmd = Self::build_command(&request)?;
        let mut child = cmd.spawn().map_err(|e| {
            error!(worker = %worker, error = %e, "Failed to spawn worker");
            LaunchError::from_io(
                request.spec.name(),
                request.instance,
                request.spec.command(),
                &e,
            )
        })?;

        // `id()` is only None once the child has been reaped.
        let pid = child.id().ok_or_else(|| {
            LaunchError::new(
                request.spec.name(),
                request.instance,
                LaunchCause::Io("process exited before its pid was read".to_string()),
            )
        })?;

        if let Some(stdout) = child.stdout.take() {
            self.forward_output(stdout, worker.clone(), OutputStream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.forward_output(stderr, worker.clone(), OutputStream::Stderr);
        }

        info!(worker = %worker, pid, "Worker spawned");
        Ok(LaunchedProcess {
            pid,
            exit: Self::create_exit_future(child, pid),
        })
    }

    #[cfg(unix)]
    async fn signal(&self, pid: u32, stop: StopSignal) -> Result<()> {
        let sig = match stop {
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        };
        let target = Pid::from_raw(pid as i32);

        debug!(pid, signal = %stop, "Signalling process group");
        let result = match signal::killpg(target, sig) {
            Err(Errno::ESRCH) | Err(Errno::EPERM) => signal::kill(target, sig),
            other => other,
        };
        match result {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(SupervisorError::Signal {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    #[cfg(not(unix))]
    async fn signal(&self, pid: u32, _stop: StopSignal) -> Result<()> {
        Err(SupervisorError::Signal {
            pid,
            reason: "signals are not supported on this platform".to_string(),
        })
    }
}
