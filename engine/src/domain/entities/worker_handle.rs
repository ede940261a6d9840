// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! WorkerHandle entity
//! Runtime record of one instance of a spec. Owned by the supervisor; every
//! mutation goes through a state-checked `mark_*` method.

use crate::domain::{ExitStatus, LaunchError, Result, SupervisorError, WorkerId, WorkerState};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Receives the exit status once the monitoring task observes it
pub type ExitReceiver = watch::Receiver<Option<ExitStatus>>;

#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    state: WorkerState,
    failed: bool,
    pid: Option<u32>,
    /// Unique per launch; exit events and timers carry it to detect staleness
    generation: u64,
    started_at: Option<SystemTime>,
    started_instant: Option<Instant>,
    exited_at: Option<SystemTime>,
    exit_status: Option<ExitStatus>,
    consecutive_failures: u32,
    restart_count: u32,
    last_restart_delay: Option<Duration>,
    last_error: Option<String>,
    restart_times: VecDeque<Instant>,
    restart_timer: Option<CancellationToken>,
    restart_due: Option<Instant>,
    exit_rx: Option<ExitReceiver>,
}

/// Point-in-time copy of a handle, safe to hand to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSnapshot {
    pub name: String,
    pub instance: usize,
    pub pid: Option<u32>,
    pub state: WorkerState,
    pub failed: bool,
    pub started_at: Option<SystemTime>,
    pub exited_at: Option<SystemTime>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub consecutive_failures: u32,
    pub restart_count: u32,
    pub last_restart_delay: Option<Duration>,
    pub last_error: Option<String>,
    pub uptime: Option<Duration>,
}

impl WorkerHandle {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            state: WorkerState::Pending,
            failed: false,
            pid: None,
            generation: 0,
            started_at: None,
            started_instant: None,
            exited_at: None,
            exit_status: None,
            consecutive_failures: 0,
            restart_count: 0,
            last_restart_delay: None,
            last_error: None,
            restart_times: VecDeque::new(),
            restart_timer: None,
            restart_due: None,
            exit_rx: None,
        }
    }

    // ===== Accessors =====

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn instance(&self) -> usize {
        self.id.instance
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// When the armed restart timer fires, if one is armed
    pub fn restart_due(&self) -> Option<Instant> {
        self.restart_due
    }

    pub fn exit_receiver(&self) -> Option<ExitReceiver> {
        self.exit_rx.clone()
    }

    pub fn uptime(&self) -> Option<Duration> {
        if self.state != WorkerState::Running {
            return None;
        }
        self.started_instant.map(|started| started.elapsed())
    }

    /// Eligible for `start`: not running, not sticky-failed
    pub fn is_startable(&self) -> bool {
        !self.failed && self.state.can_start()
    }

    // ===== State transitions =====

    fn transition(&mut self, next: WorkerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(SupervisorError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Enter `Starting` under a fresh generation.
    pub fn mark_starting(&mut self, generation: u64) -> Result<()> {
        self.transition(WorkerState::Starting)?;
        self.restart_timer = None;
        self.restart_due = None;
        self.generation = generation;
        self.pid = None;
        self.exit_rx = None;
        Ok(())
    }

    pub fn mark_running(&mut self, pid: u32, exit_rx: ExitReceiver) -> Result<()> {
        self.transition(WorkerState::Running)?;
        self.pid = Some(pid);
        self.exit_rx = Some(exit_rx);
        self.started_at = Some(SystemTime::now());
        self.started_instant = Some(Instant::now());
        self.last_error = None;
        Ok(())
    }

    pub fn mark_stopping(&mut self) -> Result<()> {
        self.transition(WorkerState::Stopping)
    }

    /// Enter `Stopped`, cancelling any armed restart timer.
    pub fn mark_stopped(&mut self) -> Result<()> {
        self.transition(WorkerState::Stopped)?;
        self.cancel_restart_timer();
        self.pid = None;
        self.exit_rx = None;
        Ok(())
    }

    /// Record an operator-requested exit (`Stopping` -> `Stopped`).
    pub fn record_stop_exit(&mut self, status: ExitStatus) -> Result<()> {
        self.mark_stopped()?;
        self.exited_at = Some(SystemTime::now());
        self.exit_status = Some(status);
        Ok(())
    }

    /// Record a spontaneous exit and return how long the run lasted.
    pub fn record_exit(&mut self, status: ExitStatus) -> Result<Duration> {
        self.transition(WorkerState::Exited)?;
        let uptime = self
            .started_instant
            .take()
            .map(|started| started.elapsed())
            .unwrap_or(Duration::ZERO);
        self.pid = None;
        self.exit_rx = None;
        self.exited_at = Some(SystemTime::now());
        self.exit_status = Some(status);
        Ok(uptime)
    }

    /// A launch that never produced a process counts as a zero-uptime exit.
    pub fn record_launch_failure(&mut self, err: &LaunchError) -> Result<()> {
        self.transition(WorkerState::Exited)?;
        self.started_instant = None;
        self.pid = None;
        self.exit_rx = None;
        self.exited_at = Some(SystemTime::now());
        self.exit_status = None;
        self.last_error = Some(err.to_string());
        Ok(())
    }

    /// Extend or reset the failure streak based on how long the run lasted.
    pub fn update_failures(&mut self, uptime: Duration, min_uptime: Duration) {
        if uptime < min_uptime {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        } else {
            self.consecutive_failures = 0;
        }
    }

    pub fn mark_restarting(&mut self, delay: Duration, timer: CancellationToken) -> Result<()> {
        self.transition(WorkerState::Restarting)?;
        self.restart_count = self.restart_count.saturating_add(1);
        self.last_restart_delay = Some(delay);
        self.restart_due = Some(Instant::now() + delay);
        self.restart_timer = Some(timer);
        Ok(())
    }

    /// Count an automatic restart against a start-limit window of
    /// `interval`. Entries older than the window are dropped.
    pub fn record_restart(&mut self, interval: Duration) {
        self.restart_times.push_back(Instant::now());
        self.restarts_within(interval);
    }

    /// Sticky failure: stop and refuse automatic or `start` relaunches.
    pub fn mark_failed(&mut self, reason: String) -> Result<()> {
        self.transition(WorkerState::Stopped)?;
        self.cancel_restart_timer();
        self.failed = true;
        self.last_error = Some(reason);
        Ok(())
    }

    /// Operator reset: clears the sticky flag and the failure streak.
    pub fn clear_failure(&mut self) {
        self.failed = false;
        self.consecutive_failures = 0;
        self.restart_times.clear();
    }

    pub fn cancel_restart_timer(&mut self) -> bool {
        self.restart_due = None;
        match self.restart_timer.take() {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Automatic restarts recorded within the trailing `interval`.
    pub fn restarts_within(&mut self, interval: Duration) -> usize {
        let now = Instant::now();
        while let Some(&oldest) = self.restart_times.front() {
            if now.duration_since(oldest) > interval {
                self.restart_times.pop_front();
            } else {
                break;
            }
        }
        self.restart_times.len()
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            name: self.id.name.clone(),
            instance: self.id.instance,
            pid: self.pid,
            state: self.state,
            failed: self.failed,
            started_at: self.started_at,
            exited_at: self.exited_at,
            exit_code: self.exit_status.and_then(|s| s.code()),
            signal: self.exit_status.and_then(|s| s.signal()),
            consecutive_failures: self.consecutive_failures,
            restart_count: self.restart_count,
            last_restart_delay: self.last_restart_delay,
            last_error: self.last_error.clone(),
            uptime: self.uptime(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LaunchCause;

    fn running_handle() -> (WorkerHandle, watch::Sender<Option<ExitStatus>>) {
        let mut handle = WorkerHandle::new(WorkerId::new("crawler_gas_price", 0));
        let (tx, rx) = watch::channel(None);
        handle.mark_starting(1).unwrap();
        handle.mark_running(4242, rx).unwrap();
        (handle, tx)
    }

    #[test]
    fn test_new_handle_is_pending() {
        let handle = WorkerHandle::new(WorkerId::new("mark_price", 2));
        assert_eq!(handle.state(), WorkerState::Pending);
        assert_eq!(handle.instance(), 2);
        assert!(handle.pid().is_none());
        assert!(handle.is_startable());
    }

    #[tokio::test]
    async fn test_running_records_pid() {
        let (handle, _tx) = running_handle();
        assert_eq!(handle.state(), WorkerState::Running);
        assert_eq!(handle.pid(), Some(4242));
        assert!(handle.exit_receiver().is_some());
        assert!(handle.uptime().is_some());
        assert!(!handle.is_startable());
    }

    #[tokio::test]
    async fn test_record_exit_clears_pid() {
        let (mut handle, _tx) = running_handle();
        handle.record_exit(ExitStatus::from_code(1)).unwrap();

        assert_eq!(handle.state(), WorkerState::Exited);
        assert!(handle.pid().is_none());
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.exit_code, Some(1));
        assert!(snapshot.exited_at.is_some());
        assert!(snapshot.uptime.is_none());
    }

    #[test]
    fn test_update_failures() {
        let mut handle = WorkerHandle::new(WorkerId::new("upload", 0));
        let min = Duration::from_secs(1);

        handle.update_failures(Duration::from_millis(200), min);
        handle.update_failures(Duration::from_millis(200), min);
        assert_eq!(handle.consecutive_failures(), 2);

        handle.update_failures(Duration::from_secs(1), min);
        assert_eq!(handle.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_restarting_cancelled_by_stop() {
        let (mut handle, _tx) = running_handle();
        handle.record_exit(ExitStatus::from_code(1)).unwrap();

        let timer = CancellationToken::new();
        handle
            .mark_restarting(Duration::from_secs(5), timer.clone())
            .unwrap();
        assert_eq!(handle.restart_count(), 1);

        handle.mark_stopped().unwrap();
        assert!(timer.is_cancelled());
        assert_eq!(handle.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_sticky_failure_and_clear() {
        let (mut handle, _tx) = running_handle();
        handle.record_exit(ExitStatus::from_code(1)).unwrap();
        handle.update_failures(Duration::ZERO, Duration::from_secs(1));
        handle.mark_failed("too many restarts".to_string()).unwrap();

        assert!(handle.is_failed());
        assert_eq!(handle.state(), WorkerState::Stopped);
        assert!(!handle.is_startable());

        handle.clear_failure();
        assert!(!handle.is_failed());
        assert_eq!(handle.consecutive_failures(), 0);
        assert!(handle.is_startable());
    }

    #[test]
    fn test_launch_failure_records_error() {
        let mut handle = WorkerHandle::new(WorkerId::new("upload", 0));
        handle.mark_starting(7).unwrap();
        let err = LaunchError::new("upload", 0, LaunchCause::InterpreterNotFound("bash".into()));
        handle.record_launch_failure(&err).unwrap();

        assert_eq!(handle.state(), WorkerState::Exited);
        assert_eq!(handle.generation(), 7);
        assert!(handle.last_error().unwrap().contains("interpreter not found"));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut handle = WorkerHandle::new(WorkerId::new("upload", 0));
        let err = handle.mark_stopping().unwrap_err();
        assert_eq!(
            err,
            SupervisorError::InvalidStateTransition {
                from: "pending".to_string(),
                to: "stopping".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_within_window() {
        let mut handle = WorkerHandle::new(WorkerId::new("cmc_price_crawler", 0));
        for _ in 0..3 {
            handle.mark_starting(1).unwrap();
            let (_tx, rx) = watch::channel(None);
            handle.mark_running(1, rx).unwrap();
            handle.record_exit(ExitStatus::from_code(1)).unwrap();
            handle
                .mark_restarting(Duration::ZERO, CancellationToken::new())
                .unwrap();
            handle.record_restart(Duration::from_secs(60));
            tokio::time::advance(Duration::from_secs(10)).await;
        }
        assert_eq!(handle.restarts_within(Duration::from_secs(25)), 2);
        assert_eq!(handle.restarts_within(Duration::from_secs(5)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_history_is_bounded_by_window() {
        let mut handle = WorkerHandle::new(WorkerId::new("mark_price", 0));
        for _ in 0..500 {
            handle.mark_starting(1).unwrap();
            let (_tx, rx) = watch::channel(None);
            handle.mark_running(1, rx).unwrap();
            tokio::time::advance(Duration::from_secs(2)).await;
            handle.record_exit(ExitStatus::from_code(0)).unwrap();
            handle
                .mark_restarting(Duration::ZERO, CancellationToken::new())
                .unwrap();
        }
        assert_eq!(handle.restart_count(), 500);
        assert!(handle.restart_times.is_empty());

        for _ in 0..500 {
            handle.record_restart(Duration::from_secs(30));
            tokio::time::advance(Duration::from_secs(2)).await;
        }
        assert!(handle.restart_times.len() <= 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_due_follows_timer() {
        let (mut handle, _tx) = running_handle();
        handle.record_exit(ExitStatus::from_code(1)).unwrap();
        handle
            .mark_restarting(Duration::from_secs(5), CancellationToken::new())
            .unwrap();
        assert_eq!(
            handle.restart_due(),
            Some(Instant::now() + Duration::from_secs(5))
        );

        handle.cancel_restart_timer();
        assert!(handle.restart_due().is_none());
    }
}
