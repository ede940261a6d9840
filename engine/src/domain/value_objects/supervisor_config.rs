// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! SupervisorConfig value object
//! Restart safety limits and stop timeouts applied to every worker

use crate::constants::{
    DEFAULT_KILL_TIMEOUT, DEFAULT_MAX_RESTARTS, DEFAULT_MIN_UPTIME, DEFAULT_STOP_TIMEOUT,
};
use crate::domain::BackoffPolicy;
use serde::Serialize;
use std::time::Duration;

/// Sliding-window start limit: more than `burst` automatic restarts inside
/// `interval` marks the worker failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestartWindow {
    pub burst: usize,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorConfig {
    /// Runs shorter than this extend the failure streak
    pub min_uptime: Duration,

    /// Ceiling on `consecutive_failures`
    pub max_restarts: u32,

    pub restart_window: Option<RestartWindow>,

    /// Grace period between SIGTERM and SIGKILL
    pub stop_timeout: Duration,

    /// Wait after SIGKILL before giving up on a worker
    pub kill_timeout: Duration,

    pub backoff: BackoffPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            min_uptime: DEFAULT_MIN_UPTIME,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_window: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
            backoff: BackoffPolicy::Constant,
        }
    }
}

/// Outcome of evaluating restart policy after an exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart { delay: Duration },
    GiveUp,
}

impl SupervisorConfig {
    /// `recent_restarts` is the number of automatic restarts inside the
    /// restart window (ignored when no window is configured).
    pub fn decide(
        &self,
        consecutive_failures: u32,
        recent_restarts: usize,
        restart_delay: Duration,
    ) -> RestartDecision {
        if consecutive_failures > self.max_restarts {
            return RestartDecision::GiveUp;
        }
        if let Some(window) = self.restart_window {
            if recent_restarts >= window.burst {
                return RestartDecision::GiveUp;
            }
        }
        RestartDecision::Restart {
            delay: self.backoff.delay(consecutive_failures, restart_delay),
        }
    }
}
