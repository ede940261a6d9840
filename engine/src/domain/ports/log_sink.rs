// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! LogSink port
//! Destination for worker stdout/stderr lines

use crate::domain::WorkerId;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Receives one output line at a time, without its trailing newline.
/// Implementations must not block for long: they run on the task that
/// drains the worker's pipe.
pub trait LogSink: Send + Sync {
    fn write_line(&self, worker: &WorkerId, stream: OutputStream, line: &[u8]);
}
