// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Launcher port
//! Interface for creating worker processes and delivering stop signals

use crate::constants::{ENV_WORKER_INSTANCE, ENV_WORKER_NAME};
use crate::domain::{ExitStatus, LaunchError, ProcessSpec, Result, WorkerId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Resolves once the launched process has exited
pub type ExitFuture = Pin<Box<dyn Future<Output = Result<ExitStatus>> + Send>>;

/// One instance of a spec to be launched
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub spec: Arc<ProcessSpec>,
    pub instance: usize,
}

impl LaunchRequest {
    pub fn new(spec: Arc<ProcessSpec>, instance: usize) -> Self {
        Self { spec, instance }
    }

    pub fn worker_id(&self) -> WorkerId {
        WorkerId::new(self.spec.name(), self.instance)
    }

    /// Spec environment plus the worker identity variables
    pub fn env(&self) -> BTreeMap<String, String> {
        let mut env = self.spec.env().clone();
        env.insert(ENV_WORKER_NAME.to_string(), self.spec.name().to_string());
        env.insert(ENV_WORKER_INSTANCE.to_string(), self.instance.to_string());
        env
    }
}

/// A process the launcher confirmed alive
pub struct LaunchedProcess {
    pub pid: u32,
    pub exit: ExitFuture,
}

impl fmt::Debug for LaunchedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedProcess")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Signals the supervisor sends when stopping a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopSignal {
    /// Graceful stop request
    Terminate,
    /// Forced kill after the stop timeout
    Kill,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSignal::Terminate => write!(f, "SIGTERM"),
            StopSignal::Kill => write!(f, "SIGKILL"),
        }
    }
}

/// Port for running worker processes
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Create the process for `request`. The returned exit future must
    /// resolve exactly once, when the process ends.
    async fn launch(&self, request: LaunchRequest) -> std::result::Result<LaunchedProcess, LaunchError>;

    /// Deliver `signal` to the worker (and its process group). A process
    /// that is already gone is not an error.
    async fn signal(&self, pid: u32, signal: StopSignal) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_includes_worker_identity() {
        let spec = ProcessSpec::builder("cmc_price_crawler", "cmc_price_crawler")
            .env("CMC_API_KEY", "secret")
            .instances(2)
            .build()
            .unwrap();
        let request = LaunchRequest::new(Arc::new(spec), 1);

        let env = request.env();
        assert_eq!(env.get("CMC_API_KEY").map(String::as_str), Some("secret"));
        assert_eq!(
            env.get(ENV_WORKER_NAME).map(String::as_str),
            Some("cmc_price_crawler")
        );
        assert_eq!(env.get(ENV_WORKER_INSTANCE).map(String::as_str), Some("1"));
        assert_eq!(request.worker_id(), WorkerId::new("cmc_price_crawler", 1));
    }

    #[test]
    fn test_stop_signal_display() {
        assert_eq!(StopSignal::Terminate.to_string(), "SIGTERM");
        assert_eq!(StopSignal::Kill.to_string(), "SIGKILL");
    }
}
