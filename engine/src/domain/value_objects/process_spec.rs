// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! ProcessSpec value object
//! Immutable description of one worker program and how many copies to run

use crate::domain::{Result, SupervisorError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the worker program is invoked
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Interpreter {
    /// Execute the command directly
    #[default]
    None,

    /// Run the command as a script through the named interpreter (e.g. `bash`)
    Named(String),
}

impl Interpreter {
    /// `none` (or an empty string) means direct execution
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            Interpreter::None
        } else {
            Interpreter::Named(trimmed.to_string())
        }
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpreter::None => write!(f, "none"),
            Interpreter::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Execution mode of a spec's instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ExecMode {
    /// One independent OS process per instance
    #[default]
    Fork,

    /// Reserved for load-balanced groups; launched like `Fork`
    Cluster,
}

impl ExecMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fork" | "fork_mode" => Some(ExecMode::Fork),
            "cluster" | "cluster_mode" => Some(ExecMode::Cluster),
            _ => None,
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::Fork => write!(f, "fork"),
            ExecMode::Cluster => write!(f, "cluster"),
        }
    }
}

/// Declarative description of one worker.
///
/// Specs are keyed by `name` and never mutated once registered; a reload
/// replaces the whole spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSpec {
    name: String,
    command: String,
    args: Vec<String>,
    interpreter: Interpreter,
    mode: ExecMode,
    instances: usize,
    restart_delay: Duration,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn builder(name: impl Into<String>, command: impl Into<String>) -> ProcessSpecBuilder {
        ProcessSpecBuilder::new(name.into(), command.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn restart_delay(&self) -> Duration {
        self.restart_delay
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(SupervisorError::InvalidSpec {
                name: self.name.clone(),
                reason: reason.to_string(),
            })
        };

        if self.name.trim().is_empty() {
            return invalid("name cannot be empty");
        }
        if self.command.trim().is_empty() {
            return invalid("command cannot be empty");
        }
        if self.instances == 0 {
            return invalid("instances must be at least 1");
        }
        Ok(())
    }
}

pub struct ProcessSpecBuilder {
    spec: ProcessSpec,
}

impl ProcessSpecBuilder {
    fn new(name: String, command: String) -> Self {
        Self {
            spec: ProcessSpec {
                name,
                command,
                args: Vec::new(),
                interpreter: Interpreter::None,
                mode: ExecMode::Fork,
                instances: 1,
                restart_delay: Duration::ZERO,
                env: BTreeMap::new(),
                cwd: None,
            },
        }
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.spec.args = args;
        self
    }

    pub fn interpreter(mut self, interpreter: Interpreter) -> Self {
        self.spec.interpreter = interpreter;
        self
    }

    pub fn mode(mut self, mode: ExecMode) -> Self {
        self.spec.mode = mode;
        self
    }

    pub fn instances(mut self, instances: usize) -> Self {
        self.spec.instances = instances;
        self
    }

    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.spec.restart_delay = delay;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.insert(key.into(), value.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.spec.cwd = Some(cwd.into());
        self
    }

    pub fn build(self) -> Result<ProcessSpec> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let spec = ProcessSpec::builder("cmc_global_metrics", "cmc_global_metrics")
            .build()
            .unwrap();

        assert_eq!(spec.name(), "cmc_global_metrics");
        assert_eq!(spec.command(), "cmc_global_metrics");
        assert!(spec.args().is_empty());
        assert_eq!(spec.interpreter(), &Interpreter::None);
        assert_eq!(spec.mode(), ExecMode::Fork);
        assert_eq!(spec.instances(), 1);
        assert_eq!(spec.restart_delay(), Duration::ZERO);
        assert!(spec.env().is_empty());
        assert!(spec.cwd().is_none());
    }

    #[test]
    fn test_builder_rejects_zero_instances() {
        let err = ProcessSpec::builder("mark_price", "mark_price")
            .instances(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidSpec { ref name, .. } if name == "mark_price"));
    }

    #[test]
    fn test_builder_rejects_empty_command() {
        assert!(ProcessSpec::builder("upload", "  ").build().is_err());
    }

    #[test]
    fn test_builder_rejects_empty_name() {
        assert!(ProcessSpec::builder("", "/bin/true").build().is_err());
    }

    #[test]
    fn test_specs_compare_by_value() {
        let a = ProcessSpec::builder("upload", "/usr/local/bin/upload.sh")
            .interpreter(Interpreter::parse("bash"))
            .restart_delay(Duration::from_millis(5000))
            .build()
            .unwrap();
        let b = a.clone();
        let c = ProcessSpec::builder("upload", "/usr/local/bin/upload-v2.sh")
            .interpreter(Interpreter::parse("bash"))
            .restart_delay(Duration::from_millis(5000))
            .build()
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_interpreter_parse() {
        assert_eq!(Interpreter::parse("none"), Interpreter::None);
        assert_eq!(Interpreter::parse("NONE"), Interpreter::None);
        assert_eq!(Interpreter::parse(""), Interpreter::None);
        assert_eq!(
            Interpreter::parse("bash"),
            Interpreter::Named("bash".to_string())
        );
        assert_eq!(Interpreter::Named("bash".to_string()).to_string(), "bash");
    }

    #[test]
    fn test_exec_mode_parse() {
        assert_eq!(ExecMode::parse("fork"), Some(ExecMode::Fork));
        assert_eq!(ExecMode::parse("fork_mode"), Some(ExecMode::Fork));
        assert_eq!(ExecMode::parse("cluster"), Some(ExecMode::Cluster));
        assert_eq!(ExecMode::parse("Cluster_Mode"), Some(ExecMode::Cluster));
        assert_eq!(ExecMode::parse("threads"), None);
    }
}
