// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Supervisor Service
//! Owns every worker handle, reacts to process exits, and exposes the
//! control operations (apply/start/stop/restart/remove/status).
//!
//! Locking: each spec has an async `op_lock` that serializes control
//! operations and timer-driven relaunches for that spec, and a short
//! synchronous lock around its handles. Exit events only take the short
//! lock, so a stop waiting for an exit never deadlocks with the monitor,
//! and `status()` never waits on an in-flight operation.

use crate::domain::entities::worker_handle::ExitReceiver;
use crate::domain::ports::{LaunchRequest, LaunchedProcess, Launcher, StopSignal};
use crate::domain::{
    ExitStatus, LaunchError, ProcessSpec, RestartDecision, Result, SupervisorConfig,
    SupervisorError, WorkerHandle, WorkerId, WorkerSnapshot, WorkerState,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What an `apply` call changed, by spec name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ApplySummary {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Process supervisor.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    launcher: Arc<dyn Launcher>,
    config: SupervisorConfig,
    groups: RwLock<BTreeMap<String, Arc<SpecGroup>>>,
    /// Serializes `apply` and `remove` so registry diffs never interleave
    apply_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

/// All instances of one registered spec
struct SpecGroup {
    name: String,
    op_lock: tokio::sync::Mutex<()>,
    state: Mutex<GroupState>,
}

struct GroupState {
    spec: Arc<ProcessSpec>,
    handles: Vec<WorkerHandle>,
    removed: bool,
}

impl SpecGroup {
    fn new(spec: ProcessSpec) -> Self {
        let handles = (0..spec.instances())
            .map(|index| WorkerHandle::new(WorkerId::new(spec.name(), index)))
            .collect();
        Self {
            name: spec.name().to_string(),
            op_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(GroupState {
                spec: Arc::new(spec),
                handles,
                removed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spec(&self) -> Arc<ProcessSpec> {
        Arc::clone(&self.lock().spec)
    }

    fn indices(&self) -> Vec<usize> {
        (0..self.lock().handles.len()).collect()
    }

    fn snapshots(&self) -> Vec<WorkerSnapshot> {
        let state = self.lock();
        if state.removed {
            return Vec::new();
        }
        state.handles.iter().map(WorkerHandle::snapshot).collect()
    }
}

impl Supervisor {
    pub fn new(launcher: Arc<dyn Launcher>, config: SupervisorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                launcher,
                config,
                groups: RwLock::new(BTreeMap::new()),
                apply_lock: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Converge on `specs` as the complete desired set.
    ///
    /// New specs have all instances launched, removed specs are stopped and
    /// unregistered, and changed specs are rolled one instance at a time.
    /// Specs are processed concurrently; the call returns once every diff
    /// has converged. Per-worker launch failures are recorded on the
    /// handles, only invalid input is returned as an error.
    pub async fn apply(&self, specs: Vec<ProcessSpec>) -> Result<ApplySummary> {
        let mut seen = HashSet::new();
        for spec in &specs {
            spec.validate()?;
            if !seen.insert(spec.name().to_string()) {
                return Err(SupervisorError::DuplicateSpec(spec.name().to_string()));
            }
        }

        let _apply = self.inner.apply_lock.lock().await;
        let current = self.inner.read_groups();
        let mut summary = ApplySummary::default();
        let mut tasks = JoinSet::new();

        for spec in specs {
            let name = spec.name().to_string();
            match current.get(&name) {
                None => {
                    let group = Arc::new(SpecGroup::new(spec));
                    self.inner.write_groups().insert(name.clone(), Arc::clone(&group));
                    info!(name = %name, instances = group.indices().len(), "Registered spec");

                    let inner = Arc::clone(&self.inner);
                    tasks.spawn(async move {
                        let _op = group.op_lock.lock().await;
                        inner.start_instances(&group).await;
                    });
                    summary.added.push(name);
                }
                Some(group) if *group.spec() == spec => {
                    summary.unchanged.push(name);
                }
                Some(group) => {
                    info!(name = %name, "Spec changed, rolling restart");
                    let inner = Arc::clone(&self.inner);
                    let group = Arc::clone(group);
                    let spec = Arc::new(spec);
                    tasks.spawn(async move { inner.reload_group(&group, spec).await });
                    summary.changed.push(name);
                }
            }
        }

        for (name, group) in &current {
            if seen.contains(name) {
                continue;
            }
            info!(name = %name, "Spec no longer desired, removing");
            let inner = Arc::clone(&self.inner);
            let group = Arc::clone(group);
            tasks.spawn(async move { inner.remove_group(&group).await });
            summary.removed.push(name.clone());
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Apply task failed");
            }
        }

        Ok(summary)
    }

    /// Launch every stopped instance of `name`. Running instances are left
    /// alone; sticky-failed instances need `restart`.
    pub async fn start(&self, name: &str) -> Result<()> {
        let group = self.inner.group(name)?;
        let _op = group.op_lock.lock().await;
        self.inner.ensure_registered(&group)?;
        self.inner.start_instances(&group).await;
        Ok(())
    }

    /// Gracefully stop every instance of `name`, escalating to SIGKILL after
    /// the stop timeout. Pending restarts are cancelled.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let group = self.inner.group(name)?;
        let _op = group.op_lock.lock().await;
        self.inner.ensure_registered(&group)?;
        self.inner.stop_instances(&group, &group.indices()).await;
        Ok(())
    }

    /// Stop and relaunch each instance in index order, clearing any sticky
    /// failure.
    pub async fn restart(&self, name: &str) -> Result<()> {
        let group = self.inner.group(name)?;
        let _op = group.op_lock.lock().await;
        self.inner.ensure_registered(&group)?;
        self.inner.roll_instances(&group, &group.indices()).await;
        Ok(())
    }

    /// Stop every instance of `name` and unregister it.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let _apply = self.inner.apply_lock.lock().await;
        let group = self.inner.group(name)?;
        self.inner.remove_group(&group).await;
        Ok(())
    }

    /// Stop every worker of every spec concurrently. Specs stay registered.
    pub async fn shutdown(&self) {
        let groups = self.inner.read_groups();
        info!(specs = groups.len(), "Shutting down all workers");

        let mut tasks = JoinSet::new();
        for group in groups.into_values() {
            let inner = Arc::clone(&self.inner);
            tasks.spawn(async move {
                let _op = group.op_lock.lock().await;
                inner.stop_instances(&group, &group.indices()).await;
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Shutdown task failed");
            }
        }
    }

    /// Last-known state of every worker, produced lazily spec by spec.
    pub fn status(&self) -> impl Iterator<Item = WorkerSnapshot> {
        self.inner
            .read_groups()
            .into_values()
            .flat_map(|group| group.snapshots())
    }

    /// Last-known state of the instances of `name`
    pub fn status_of(&self, name: &str) -> Result<Vec<WorkerSnapshot>> {
        Ok(self.inner.group(name)?.snapshots())
    }

    /// Registered specs in name order
    pub fn specs(&self) -> Vec<Arc<ProcessSpec>> {
        self.inner
            .read_groups()
            .values()
            .map(|group| group.spec())
            .collect()
    }
}

impl Inner {
    fn read_groups(&self) -> BTreeMap<String, Arc<SpecGroup>> {
        self.groups
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn write_groups(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Arc<SpecGroup>>> {
        self.groups.write().unwrap_or_else(|e| e.into_inner())
    }

    fn group(&self, name: &str) -> Result<Arc<SpecGroup>> {
        self.groups
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| SupervisorError::SpecNotFound(name.to_string()))
    }

    /// A group can be unregistered while a caller waits for its op lock.
    fn ensure_registered(&self, group: &SpecGroup) -> Result<()> {
        if group.lock().removed {
            return Err(SupervisorError::SpecNotFound(group.name.clone()));
        }
        Ok(())
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ===== Control operations (caller holds op_lock) =====

    async fn start_instances(self: &Arc<Self>, group: &Arc<SpecGroup>) {
        let startable: Vec<usize> = {
            let state = group.lock();
            state
                .handles
                .iter()
                .filter(|handle| {
                    if handle.is_failed() {
                        warn!(
                            worker = %handle.id(),
                            "Worker is marked failed, use restart to clear it"
                        );
                        return false;
                    }
                    handle.is_startable()
                })
                .map(WorkerHandle::instance)
                .collect()
        };

        for index in startable {
            self.launch_instance(group, index).await;
        }
    }

    async fn restart_instance(self: &Arc<Self>, group: &Arc<SpecGroup>, index: usize) {
        {
            let mut state = group.lock();
            match state.handles.get_mut(index) {
                Some(handle) => {
                    handle.cancel_restart_timer();
                    handle.clear_failure();
                }
                None => return,
            }
        }
        self.stop_instances(group, &[index]).await;
        self.launch_instance(group, index).await;
    }

    /// Restart `indices` in order. The next instance is only stopped once
    /// the previous one is running again or its grace period ran out.
    async fn roll_instances(self: &Arc<Self>, group: &Arc<SpecGroup>, indices: &[usize]) {
        for (position, &index) in indices.iter().enumerate() {
            self.restart_instance(group, index).await;
            if position + 1 < indices.len() {
                self.await_running(group, index).await;
            }
        }
    }

    /// Wait up to `stop_timeout` for `index` to reach `Running`.
    ///
    /// The caller holds the op lock, so the restart timer cannot relaunch
    /// the instance meanwhile; due relaunches are performed here instead.
    async fn await_running(self: &Arc<Self>, group: &Arc<SpecGroup>, index: usize) {
        let deadline = Instant::now() + self.config.stop_timeout;
        let mut attempts = 0;
        loop {
            let (state, due) = {
                let state = group.lock();
                match state.handles.get(index) {
                    Some(handle) => (handle.state(), handle.restart_due()),
                    None => return,
                }
            };

            let due = match (state, due) {
                (WorkerState::Running, _) => return,
                (WorkerState::Restarting, Some(due)) => due,
                (other, _) => {
                    warn!(
                        name = %group.name,
                        instance = index,
                        state = %other,
                        "Instance did not come back, continuing rollout"
                    );
                    return;
                }
            };
            if due > deadline || attempts > self.config.max_restarts {
                warn!(
                    name = %group.name,
                    instance = index,
                    grace_ms = self.config.stop_timeout.as_millis() as u64,
                    "Instance not running within grace period, continuing rollout"
                );
                return;
            }

            sleep_until(due).await;
            let relaunch = {
                let mut state = group.lock();
                match state.handles.get_mut(index) {
                    Some(handle) if handle.state() == WorkerState::Restarting => {
                        handle.cancel_restart_timer();
                        true
                    }
                    _ => false,
                }
            };
            if relaunch {
                attempts += 1;
                self.launch_instance(group, index).await;
            }
        }
    }

    async fn reload_group(self: &Arc<Self>, group: &Arc<SpecGroup>, spec: Arc<ProcessSpec>) {
        let _op = group.op_lock.lock().await;

        let (current, desired) = {
            let mut state = group.lock();
            for handle in state.handles.iter_mut() {
                if handle.cancel_restart_timer() {
                    debug!(worker = %handle.id(), "Cancelled pending restart for reload");
                }
            }
            state.spec = Arc::clone(&spec);
            (state.handles.len(), spec.instances())
        };

        if desired < current {
            let surplus: Vec<usize> = (desired..current).rev().collect();
            info!(name = %group.name, from = current, to = desired, "Scaling down");
            self.stop_instances(group, &surplus).await;
            group.lock().handles.truncate(desired);
        }

        let surviving: Vec<usize> = (0..current.min(desired)).collect();
        self.roll_instances(group, &surviving).await;

        if desired > current {
            info!(name = %group.name, from = current, to = desired, "Scaling up");
            for index in current..desired {
                group
                    .lock()
                    .handles
                    .push(WorkerHandle::new(WorkerId::new(group.name.as_str(), index)));
                self.launch_instance(group, index).await;
            }
        }
    }

    async fn remove_group(self: &Arc<Self>, group: &Arc<SpecGroup>) {
        let _op = group.op_lock.lock().await;
        self.stop_instances(group, &group.indices()).await;

        group.lock().removed = true;
        let mut groups = self.write_groups();
        if groups
            .get(&group.name)
            .map_or(false, |registered| Arc::ptr_eq(registered, group))
        {
            groups.remove(&group.name);
        }
        info!(name = %group.name, "Removed spec");
    }

    /// Stop `indices` concurrently under one shared grace period, then
    /// SIGKILL whatever is left.
    async fn stop_instances(self: &Arc<Self>, group: &Arc<SpecGroup>, indices: &[usize]) {
        let mut waiting: Vec<(WorkerId, u64, u32, ExitReceiver)> = Vec::new();
        {
            let mut state = group.lock();
            for &index in indices {
                let Some(handle) = state.handles.get_mut(index) else {
                    continue;
                };
                match handle.state() {
                    WorkerState::Running => {
                        let (Some(pid), Some(rx)) = (handle.pid(), handle.exit_receiver()) else {
                            error!(worker = %handle.id(), "Running worker has no process");
                            continue;
                        };
                        if let Err(e) = handle.mark_stopping() {
                            error!(worker = %handle.id(), error = %e, "Cannot stop worker");
                            continue;
                        }
                        waiting.push((handle.id().clone(), handle.generation(), pid, rx));
                    }
                    WorkerState::Pending | WorkerState::Exited | WorkerState::Restarting => {
                        match handle.mark_stopped() {
                            Ok(()) => info!(worker = %handle.id(), "Worker stopped"),
                            Err(e) => error!(worker = %handle.id(), error = %e, "Cannot stop worker"),
                        }
                    }
                    WorkerState::Starting | WorkerState::Stopping | WorkerState::Stopped => {}
                }
            }
        }

        for (id, _, pid, _) in &waiting {
            info!(worker = %id, pid, "Sending SIGTERM");
            if let Err(e) = self.launcher.signal(*pid, StopSignal::Terminate).await {
                warn!(worker = %id, pid, error = %e, "Failed to send SIGTERM");
            }
        }

        let deadline = Instant::now() + self.config.stop_timeout;
        let mut stubborn = Vec::new();
        for (id, generation, pid, mut rx) in waiting {
            let exited = matches!(
                timeout_at(deadline, rx.wait_for(Option::is_some)).await,
                Ok(_)
            );
            if !exited {
                stubborn.push((id, generation, pid, rx));
            }
        }
        if stubborn.is_empty() {
            return;
        }

        for (id, _, pid, _) in &stubborn {
            let timeout = SupervisorError::TerminationTimeout {
                name: id.name.clone(),
                instance: id.instance,
                timeout: self.config.stop_timeout,
            };
            warn!(pid, "{}, sending SIGKILL", timeout);
            if let Err(e) = self.launcher.signal(*pid, StopSignal::Kill).await {
                warn!(worker = %id, pid, error = %e, "Failed to send SIGKILL");
            }
        }

        let deadline = Instant::now() + self.config.kill_timeout;
        for (id, generation, pid, mut rx) in stubborn {
            let exited = matches!(
                timeout_at(deadline, rx.wait_for(Option::is_some)).await,
                Ok(_)
            );
            if exited {
                continue;
            }
            error!(worker = %id, pid, "Worker survived SIGKILL, abandoning it");
            let mut state = group.lock();
            if let Some(handle) = state
                .handles
                .get_mut(id.instance)
                .filter(|handle| handle.is_current(generation))
            {
                if let Err(e) = handle.mark_stopped() {
                    error!(worker = %id, error = %e, "Cannot stop worker");
                }
            }
        }
    }

    async fn launch_instance(self: &Arc<Self>, group: &Arc<SpecGroup>, index: usize) {
        let generation = self.next_generation();
        let request = {
            let mut state = group.lock();
            if state.removed {
                return;
            }
            let spec = Arc::clone(&state.spec);
            let Some(handle) = state.handles.get_mut(index) else {
                return;
            };
            if let Err(e) = handle.mark_starting(generation) {
                error!(worker = %handle.id(), error = %e, "Cannot launch worker");
                return;
            }
            LaunchRequest::new(spec, index)
        };

        debug!(name = %group.name, instance = index, generation, "Launching worker");
        match self.launcher.launch(request).await {
            Ok(launched) => self.on_launched(group, index, generation, launched).await,
            Err(err) => self.on_launch_failed(group, index, generation, err),
        }
    }

    async fn on_launched(
        self: &Arc<Self>,
        group: &Arc<SpecGroup>,
        index: usize,
        generation: u64,
        launched: LaunchedProcess,
    ) {
        let LaunchedProcess { pid, exit } = launched;
        let (tx, rx) = watch::channel(None);

        let accepted = {
            let mut state = group.lock();
            match state
                .handles
                .get_mut(index)
                .filter(|handle| handle.is_current(generation))
            {
                Some(handle) => match handle.mark_running(pid, rx) {
                    Ok(()) => {
                        info!(worker = %handle.id(), pid, "Worker running");
                        true
                    }
                    Err(e) => {
                        error!(worker = %handle.id(), error = %e, "Cannot record launch");
                        false
                    }
                },
                None => false,
            }
        };

        if !accepted {
            warn!(name = %group.name, instance = index, pid, "Killing orphaned worker");
            if let Err(e) = self.launcher.signal(pid, StopSignal::Kill).await {
                warn!(pid, error = %e, "Failed to kill orphaned worker");
            }
        }

        // Monitoring task: the OS wait runs here, never on a control path.
        let inner = Arc::clone(self);
        let group = Arc::clone(group);
        tokio::spawn(async move {
            let status = match exit.await {
                Ok(status) => status,
                Err(e) => {
                    warn!(pid, error = %e, "Lost track of worker exit");
                    ExitStatus::default()
                }
            };
            inner.on_exit(&group, index, generation, status);
            let _ = tx.send(Some(status));
        });
    }

    // ===== Exit handling (short lock only) =====

    fn on_exit(
        self: &Arc<Self>,
        group: &Arc<SpecGroup>,
        index: usize,
        generation: u64,
        status: ExitStatus,
    ) {
        let mut state = group.lock();
        let restart_delay = state.spec.restart_delay();
        let removed = state.removed;

        let Some(handle) = state
            .handles
            .get_mut(index)
            .filter(|handle| handle.is_current(generation))
        else {
            debug!(name = %group.name, instance = index, generation, "Ignoring stale exit event");
            return;
        };

        match handle.state() {
            WorkerState::Stopping => match handle.record_stop_exit(status) {
                Ok(()) => info!(worker = %handle.id(), %status, "Worker stopped"),
                Err(e) => error!(worker = %handle.id(), error = %e, "Cannot record exit"),
            },
            WorkerState::Running | WorkerState::Starting => {
                let uptime = match handle.record_exit(status) {
                    Ok(uptime) => uptime,
                    Err(e) => {
                        error!(worker = %handle.id(), error = %e, "Cannot record exit");
                        return;
                    }
                };
                if status.success() {
                    info!(
                        worker = %handle.id(),
                        uptime_ms = uptime.as_millis() as u64,
                        "Worker exited"
                    );
                } else {
                    warn!(
                        worker = %handle.id(),
                        %status,
                        uptime_ms = uptime.as_millis() as u64,
                        "Worker exited with failure"
                    );
                }
                handle.update_failures(uptime, self.config.min_uptime);

                if removed {
                    if let Err(e) = handle.mark_stopped() {
                        error!(worker = %handle.id(), error = %e, "Cannot stop worker");
                    }
                    return;
                }
                self.apply_restart_policy(group, handle, restart_delay);
            }
            other => {
                debug!(worker = %handle.id(), state = %other, "Ignoring exit event");
            }
        }
    }

    fn on_launch_failed(
        self: &Arc<Self>,
        group: &Arc<SpecGroup>,
        index: usize,
        generation: u64,
        err: LaunchError,
    ) {
        let mut state = group.lock();
        let restart_delay = state.spec.restart_delay();
        let removed = state.removed;

        let Some(handle) = state
            .handles
            .get_mut(index)
            .filter(|handle| handle.is_current(generation))
        else {
            return;
        };

        warn!(worker = %handle.id(), error = %err, "Launch failed");
        if let Err(e) = handle.record_launch_failure(&err) {
            error!(worker = %handle.id(), error = %e, "Cannot record launch failure");
            return;
        }
        handle.update_failures(Duration::ZERO, self.config.min_uptime);

        if removed {
            if let Err(e) = handle.mark_stopped() {
                error!(worker = %handle.id(), error = %e, "Cannot stop worker");
            }
            return;
        }
        self.apply_restart_policy(group, handle, restart_delay);
    }

    /// Decide what happens to a handle that just entered `Exited`.
    fn apply_restart_policy(
        self: &Arc<Self>,
        group: &Arc<SpecGroup>,
        handle: &mut WorkerHandle,
        restart_delay: Duration,
    ) {
        let failures = handle.consecutive_failures();
        let recent = match self.config.restart_window {
            Some(window) => handle.restarts_within(window.interval),
            None => 0,
        };

        match self.config.decide(failures, recent, restart_delay) {
            RestartDecision::Restart { delay } => {
                let timer = CancellationToken::new();
                if let Err(e) = handle.mark_restarting(delay, timer.clone()) {
                    error!(worker = %handle.id(), error = %e, "Cannot schedule restart");
                    return;
                }
                if let Some(window) = self.config.restart_window {
                    handle.record_restart(window.interval);
                }
                info!(
                    worker = %handle.id(),
                    delay_ms = delay.as_millis() as u64,
                    consecutive_failures = failures,
                    "Scheduling restart"
                );
                self.restart_after(group, handle.instance(), handle.generation(), delay, timer);
            }
            RestartDecision::GiveUp => {
                let ceiling = SupervisorError::RestartCeilingExceeded {
                    name: handle.id().name.clone(),
                    instance: handle.instance(),
                    failures,
                };
                warn!("{}, marking worker failed", ceiling);
                if let Err(e) = handle.mark_failed(ceiling.to_string()) {
                    error!(worker = %handle.id(), error = %e, "Cannot mark worker failed");
                }
            }
        }
    }

    fn restart_after(
        self: &Arc<Self>,
        group: &Arc<SpecGroup>,
        index: usize,
        generation: u64,
        delay: Duration,
        timer: CancellationToken,
    ) {
        let inner = Arc::clone(self);
        let group = Arc::clone(group);
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {
                    debug!(name = %group.name, instance = index, "Restart timer cancelled");
                    return;
                }
                _ = sleep(delay) => {}
            }

            let _op = group.op_lock.lock().await;
            if timer.is_cancelled() {
                return;
            }
            let due = {
                let state = group.lock();
                !state.removed
                    && state.handles.get(index).map_or(false, |handle| {
                        handle.is_current(generation) && handle.state() == WorkerState::Restarting
                    })
            };
            if due {
                inner.launch_instance(&group, index).await;
            }
        });
    }
}
