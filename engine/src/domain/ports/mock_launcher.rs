// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! In-memory launcher for tests
//! Records every launch and signal in order; exits are driven by the test.

use crate::domain::{
    ExitStatus, LaunchCause, LaunchError, Result, SupervisorError, WorkerId,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

use super::{LaunchRequest, LaunchedProcess, Launcher, StopSignal};

const SIGTERM: i32 = 15;
const SIGKILL: i32 = 9;

/// A successful launch as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockLaunch {
    pub id: WorkerId,
    pub pid: u32,
    pub command: String,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Launched(MockLaunch),
    LaunchFailed(WorkerId),
    Signalled { pid: u32, signal: StopSignal },
}

#[derive(Default)]
struct MockState {
    next_pid: u32,
    events: Vec<MockEvent>,
    alive: HashMap<u32, (WorkerId, oneshot::Sender<ExitStatus>)>,
    failures: HashMap<String, LaunchCause>,
    stubborn: HashSet<String>,
}

/// Launcher whose processes only exit when the test says so, or when
/// they receive a signal they honour.
#[derive(Clone)]
pub struct MockLauncher {
    state: Arc<Mutex<MockState>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_pid: 1000,
                ..MockState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the process with `pid` exit with `status`. Returns false if it
    /// was not alive.
    pub fn exit(&self, pid: u32, status: ExitStatus) -> bool {
        match self.lock().alive.remove(&pid) {
            Some((_, tx)) => tx.send(status).is_ok(),
            None => false,
        }
    }

    /// Fail every future launch of `name` with `cause`.
    pub fn fail_launches(&self, name: &str, cause: LaunchCause) {
        self.lock().failures.insert(name.to_string(), cause);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Processes of `name` ignore SIGTERM and only die on SIGKILL.
    pub fn ignore_terminate(&self, name: &str) {
        self.lock().stubborn.insert(name.to_string());
    }

    /// Pid of the live process for `name[instance]`, if any
    pub fn running_pid(&self, name: &str, instance: usize) -> Option<u32> {
        self.lock()
            .alive
            .iter()
            .find(|(_, (id, _))| id.name == name && id.instance == instance)
            .map(|(pid, _)| *pid)
    }

    pub fn alive_count(&self) -> usize {
        self.lock().alive.len()
    }

    pub fn launches(&self) -> Vec<MockLaunch> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Launched(launch) => Some(launch.clone()),
                _ => None,
            })
            .collect()
    }

    /// Successful launches of `name`
    pub fn launch_count(&self, name: &str) -> usize {
        self.launches()
            .iter()
            .filter(|launch| launch.id.name == name)
            .count()
    }

    pub fn signals(&self) -> Vec<(u32, StopSignal)> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Signalled { pid, signal } => Some((*pid, *signal)),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.lock().events.clone()
    }
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(
        &self,
        request: LaunchRequest,
    ) -> std::result::Result<LaunchedProcess, LaunchError> {
        let id = request.worker_id();
        let mut state = self.lock();

        if let Some(cause) = state.failures.get(&id.name).cloned() {
            state.events.push(MockEvent::LaunchFailed(id.clone()));
            return Err(LaunchError::new(id.name, id.instance, cause));
        }

        state.next_pid += 1;
        let pid = state.next_pid;
        let (tx, rx) = oneshot::channel();

        state.events.push(MockEvent::Launched(MockLaunch {
            id: id.clone(),
            pid,
            command: request.spec.command().to_string(),
            env: request.env(),
        }));
        state.alive.insert(pid, (id, tx));

        let exit = Box::pin(async move {
            rx.await.map_err(|_| SupervisorError::WaitFailed {
                pid,
                reason: "mock launcher dropped".to_string(),
            })
        });
        Ok(LaunchedProcess { pid, exit })
    }

    async fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        let mut state = self.lock();
        state.events.push(MockEvent::Signalled { pid, signal });

        let honoured = match state.alive.get(&pid) {
            Some((id, _)) => signal == StopSignal::Kill || !state.stubborn.contains(&id.name),
            None => false,
        };
        if honoured {
            if let Some((_, tx)) = state.alive.remove(&pid) {
                let code = match signal {
                    StopSignal::Terminate => SIGTERM,
                    StopSignal::Kill => SIGKILL,
                };
                let _ = tx.send(ExitStatus::from_signal(code));
            }
        }
        Ok(())
    }
}
