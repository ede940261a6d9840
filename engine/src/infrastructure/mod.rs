// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

pub mod config;
pub mod log_sink;
pub mod tokio_launcher;

pub use config::{load_apps, parse_apps, AppConfig, AppsFile};
pub use log_sink::{FileLogSink, TracingLogSink};
pub use tokio_launcher::TokioLauncher;
