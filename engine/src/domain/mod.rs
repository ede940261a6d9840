// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{WorkerHandle, WorkerSnapshot};
pub use error::{LaunchCause, LaunchError, Result, SupervisorError};
pub use ports::{
    ExitFuture, LaunchRequest, LaunchedProcess, Launcher, LogSink, MockEvent, MockLaunch,
    MockLauncher, OutputStream, StopSignal,
};
pub use services::{ApplySummary, Supervisor};
pub use value_objects::{
    BackoffPolicy, ExecMode, ExitStatus, Interpreter, ProcessSpec, ProcessSpecBuilder,
    RestartDecision, RestartWindow, SupervisorConfig, WorkerId, WorkerState,
};
