// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Default policy values shared by the library and the daemon.

use std::time::Duration;

/// A run shorter than this counts as a crash for the restart streak.
pub const DEFAULT_MIN_UPTIME: Duration = Duration::from_secs(1);

/// Consecutive short-lived runs tolerated before a worker is marked failed.
pub const DEFAULT_MAX_RESTARTS: u32 = 16;

/// Grace period between SIGTERM and SIGKILL.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a worker to disappear after SIGKILL.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for exponential backoff when none is configured.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Growth factor for exponential backoff.
pub const RESTART_BACKOFF_BASE: u32 = 2;

/// Longest worker output line forwarded as one record; longer runs are split.
pub const MAX_OUTPUT_LINE: usize = 64 * 1024;

/// Lines buffered per worker log file before new lines are dropped.
pub const LOG_BUFFERED_LINES: usize = 16_384;

/// Environment variables injected into every worker.
pub const ENV_WORKER_NAME: &str = "WORKER_NAME";
pub const ENV_WORKER_INSTANCE: &str = "WORKER_INSTANCE";
