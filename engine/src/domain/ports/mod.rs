// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

pub mod launcher;
pub mod log_sink;
pub mod mock_launcher;

pub use launcher::{ExitFuture, LaunchRequest, LaunchedProcess, Launcher, StopSignal};
pub use log_sink::{LogSink, OutputStream};
pub use mock_launcher::{MockEvent, MockLaunch, MockLauncher};
