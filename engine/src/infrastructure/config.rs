// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Apps file loading
//!
//! A single YAML document with an ordered `apps` list. Field names follow
//! the pm2 ecosystem format (`script`, `exec_interpreter`, `exec_mode`,
//! `restart_delay` in ms).

use crate::domain::{ExecMode, Interpreter, ProcessSpec, Result, SupervisorError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Top-level apps file
#[derive(Debug, Serialize, Deserialize)]
pub struct AppsFile {
    #[serde(default)]
    pub apps: Vec<AppConfig>,
}

/// Arguments as a list, or as one whitespace-separated string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppArgs {
    List(Vec<String>),
    Line(String),
}

impl AppArgs {
    fn into_vec(self) -> Vec<String> {
        match self {
            AppArgs::List(args) => args,
            AppArgs::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// One worker entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,

    pub script: String,

    #[serde(default)]
    pub args: Option<AppArgs>,

    #[serde(default)]
    pub exec_interpreter: Option<String>,

    #[serde(default)]
    pub exec_mode: Option<String>,

    #[serde(default = "default_instances")]
    pub instances: usize,

    /// Milliseconds
    #[serde(default)]
    pub restart_delay: u64,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub cwd: Option<String>,
}

fn default_instances() -> usize {
    1
}

impl AppConfig {
    pub fn into_spec(self) -> Result<ProcessSpec> {
        let invalid = |reason: String| {
            SupervisorError::InvalidConfiguration(format!("app '{}': {}", self.name, reason))
        };

        let mode = match self.exec_mode.as_deref() {
            None => ExecMode::Fork,
            Some(raw) => ExecMode::parse(raw)
                .ok_or_else(|| invalid(format!("unknown exec_mode '{}'", raw)))?,
        };
        let interpreter = self
            .exec_interpreter
            .as_deref()
            .map(Interpreter::parse)
            .unwrap_or_default();

        let mut builder = ProcessSpec::builder(self.name.as_str(), self.script.as_str())
            .args(self.args.clone().map(AppArgs::into_vec).unwrap_or_default())
            .interpreter(interpreter)
            .mode(mode)
            .instances(self.instances)
            .restart_delay(Duration::from_millis(self.restart_delay));
        for (key, value) in &self.env {
            builder = builder.env(key.as_str(), value.as_str());
        }
        if let Some(cwd) = &self.cwd {
            builder = builder.cwd(cwd.as_str());
        }

        builder.build().map_err(|e| invalid(e.to_string()))
    }
}

/// Parse an apps document into specs, preserving order.
pub fn parse_apps(yaml: &str) -> Result<Vec<ProcessSpec>> {
    let file: AppsFile = serde_yaml::from_str(yaml).map_err(|e| {
        SupervisorError::InvalidConfiguration(format!("malformed apps file: {}", e))
    })?;
    file.apps.into_iter().map(AppConfig::into_spec).collect()
}

/// Read and parse the apps file at `path`.
pub fn load_apps(path: &Path) -> Result<Vec<ProcessSpec>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SupervisorError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
    })?;
    let specs = parse_apps(&content)?;
    debug!(path = %path.display(), count = specs.len(), "Loaded apps file");
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FLEET: &str = r#"
apps:
  - name: cmc_global_metrics
    script: cmc_global_metrics
    exec_interpreter: none
    exec_mode: fork
    instances: 1
    restart_delay: 5000
  - name: upload
    script: /usr/local/bin/upload.sh
    exec_interpreter: bash
    exec_mode: fork_mode
    restart_delay: 5000
"#;

    #[test]
    fn test_parse_preserves_order_and_fields() {
        let specs = parse_apps(FLEET).unwrap();
        assert_eq!(specs.len(), 2);

        assert_eq!(specs[0].name(), "cmc_global_metrics");
        assert_eq!(specs[0].interpreter(), &Interpreter::None);
        assert_eq!(specs[0].restart_delay(), Duration::from_millis(5000));

        assert_eq!(specs[1].name(), "upload");
        assert_eq!(specs[1].command(), "/usr/local/bin/upload.sh");
        assert_eq!(specs[1].interpreter(), &Interpreter::Named("bash".to_string()));
        assert_eq!(specs[1].mode(), ExecMode::Fork);
        assert_eq!(specs[1].instances(), 1);
    }

    #[test]
    fn test_parse_optional_fields() {
        let yaml = r#"
apps:
  - name: crawler_block_header
    script: ./crawler
    args: "--chain eth --from latest"
    exec_mode: cluster_mode
    instances: 2
    env:
      RPC_URL: http://localhost:8545
    cwd: /srv/crawlers
"#;
        let spec = parse_apps(yaml).unwrap().remove(0);
        assert_eq!(spec.args(), &["--chain", "eth", "--from", "latest"]);
        assert_eq!(spec.mode(), ExecMode::Cluster);
        assert_eq!(spec.instances(), 2);
        assert_eq!(spec.restart_delay(), Duration::ZERO);
        assert_eq!(
            spec.env().get("RPC_URL").map(String::as_str),
            Some("http://localhost:8545")
        );
        assert_eq!(spec.cwd(), Some(Path::new("/srv/crawlers")));
    }

    #[test]
    fn test_unknown_exec_mode_is_rejected() {
        let yaml = "apps:\n  - name: mark_price\n    script: mark_price\n    exec_mode: threads\n";
        let err = parse_apps(yaml).unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidConfiguration(ref msg) if msg.contains("threads")));
    }

    #[test]
    fn test_zero_instances_is_rejected() {
        let yaml = "apps:\n  - name: mark_price\n    script: mark_price\n    instances: 0\n";
        assert!(matches!(
            parse_apps(yaml),
            Err(SupervisorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse_apps("apps: [").is_err());
        assert!(parse_apps("apps:\n  - name: missing_script\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FLEET.as_bytes()).unwrap();

        let specs = load_apps(file.path()).unwrap();
        assert_eq!(specs.len(), 2);

        assert!(load_apps(Path::new("/nonexistent/apps.yaml")).is_err());
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../conf/apps.yaml");
        let specs = load_apps(&path).unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "cmc_global_metrics",
                "cmc_price_crawler",
                "crawler_block_header",
                "crawler_gas_price",
                "mark_price",
                "ftx_spot_price",
                "upload",
            ]
        );
        assert!(specs
            .iter()
            .all(|s| s.restart_delay() == Duration::from_millis(5000)));
    }
}
