// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Local process supervisor.
//!
//! Launches a fixed set of long-running worker processes, watches them exit,
//! and relaunches them under a uniform restart policy.

pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use domain::{
    ApplySummary, BackoffPolicy, ExecMode, ExitStatus, Interpreter, LaunchCause, LaunchError,
    LaunchRequest, LaunchedProcess, Launcher, LogSink, MockEvent, MockLaunch, MockLauncher,
    OutputStream, ProcessSpec, Result, RestartDecision, RestartWindow, StopSignal, Supervisor,
    SupervisorConfig, SupervisorError, WorkerHandle, WorkerId, WorkerSnapshot, WorkerState,
};
pub use infrastructure::{load_apps, parse_apps, FileLogSink, TokioLauncher, TracingLogSink};
