// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! ExitStatus value object
//! How a worker process ended: an exit code, a terminating signal, or neither

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub struct ExitStatus {
    code: Option<i32>,
    signal: Option<i32>,
}

impl ExitStatus {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn from_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn signal(&self) -> Option<i32> {
        self.signal
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success() {
        assert!(ExitStatus::from_code(0).success());
        assert!(!ExitStatus::from_code(1).success());
        assert!(!ExitStatus::from_signal(9).success());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitStatus::from_code(3).to_string(), "exit code 3");
        assert_eq!(ExitStatus::from_signal(15).to_string(), "signal 15");
        assert_eq!(ExitStatus::default().to_string(), "unknown exit status");
    }

    #[cfg(unix)]
    #[test]
    fn test_from_std_signal() {
        use std::os::unix::process::ExitStatusExt;

        let status = ExitStatus::from(std::process::ExitStatus::from_raw(9));
        assert_eq!(status.signal(), Some(9));
        assert_eq!(status.code(), None);

        let status = ExitStatus::from(std::process::ExitStatus::from_raw(2 << 8));
        assert_eq!(status.code(), Some(2));
        assert_eq!(status.signal(), None);
    }
}
