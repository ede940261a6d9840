// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Supervisor error taxonomy.
//! Only invalid control-operation input is returned to callers; per-worker
//! failures are recorded on the worker handle and logged.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("Spec '{0}' not found")]
    SpecNotFound(String),

    #[error("Spec '{0}' appears more than once")]
    DuplicateSpec(String),

    #[error("Invalid spec '{name}': {reason}")]
    InvalidSpec { name: String, reason: String },

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("{name}[{instance}] exceeded the restart ceiling after {failures} consecutive failures")]
    RestartCeilingExceeded {
        name: String,
        instance: usize,
        failures: u32,
    },

    #[error("{name}[{instance}] did not exit within {timeout:?} of SIGTERM")]
    TerminationTimeout {
        name: String,
        instance: usize,
        timeout: Duration,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Failed to signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("Failed to wait for pid {pid}: {reason}")]
    WaitFailed { pid: u32, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Why the OS refused to create a worker process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchCause {
    #[error("executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("interpreter not found: {0}")]
    InterpreterNotFound(String),

    #[error("{0}")]
    Io(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to launch {name}[{instance}]: {cause}")]
pub struct LaunchError {
    pub name: String,
    pub instance: usize,
    pub cause: LaunchCause,
}

impl LaunchError {
    pub fn new(name: impl Into<String>, instance: usize, cause: LaunchCause) -> Self {
        Self {
            name: name.into(),
            instance,
            cause,
        }
    }

    /// Classify an OS spawn error for `command`.
    pub fn from_io(name: &str, instance: usize, command: &str, err: &std::io::Error) -> Self {
        let cause = match err.kind() {
            std::io::ErrorKind::NotFound => LaunchCause::ExecutableNotFound(command.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                LaunchCause::PermissionDenied(command.to_string())
            }
            _ => LaunchCause::Io(err.to_string()),
        };
        Self::new(name, instance, cause)
    }
}
