// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

pub mod backoff;
pub mod exit_status;
pub mod process_spec;
pub mod supervisor_config;
pub mod worker_id;
pub mod worker_state;

pub use backoff::BackoffPolicy;
pub use exit_status::ExitStatus;
pub use process_spec::{ExecMode, Interpreter, ProcessSpec, ProcessSpecBuilder};
pub use supervisor_config::{RestartDecision, RestartWindow, SupervisorConfig};
pub use worker_id::WorkerId;
pub use worker_state::WorkerState;
