// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! WorkerState value object
//! Lifecycle state of one worker instance

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Desired but never launched
    #[default]
    Pending,

    /// Launcher invoked, process not yet confirmed
    Starting,

    /// Process confirmed alive
    Running,

    /// Stop signal sent, waiting for the process to exit
    Stopping,

    /// Operator-requested or ceiling-imposed stop; never restarted automatically
    Stopped,

    /// Process ended on its own; restart policy not yet applied
    Exited,

    /// Backoff timer armed
    Restarting,
}

impl WorkerState {
    /// States that count against a spec's desired instance count
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            WorkerState::Starting | WorkerState::Running | WorkerState::Restarting
        )
    }

    pub fn can_start(&self) -> bool {
        matches!(
            self,
            WorkerState::Pending | WorkerState::Stopped | WorkerState::Exited
        )
    }

    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;

        match (self, next) {
            (Pending, Starting | Stopped) => true,

            (Starting, Running) => true,
            (Starting, Exited) => true, // launch failure or immediate exit
            (Starting, Stopping) => true,

            (Running, Stopping) => true,
            (Running, Exited) => true,

            (Stopping, Stopped) => true,

            (Stopped, Starting) => true,

            (Exited, Restarting) => true,
            (Exited, Starting) => true,
            (Exited, Stopped) => true, // restart ceiling

            (Restarting, Starting) => true,
            (Restarting, Stopped) => true, // pending restart cancelled

            (a, b) if *a == b => true,

            _ => false,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Pending => write!(f, "pending"),
            WorkerState::Starting => write!(f, "starting"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Stopping => write!(f, "stopping"),
            WorkerState::Stopped => write!(f, "stopped"),
            WorkerState::Exited => write!(f, "exited"),
            WorkerState::Restarting => write!(f, "restarting"),
        }
    }
}
