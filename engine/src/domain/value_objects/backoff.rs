// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! BackoffPolicy value object
//! Delay before relaunching an exited worker

use crate::constants::{DEFAULT_BACKOFF_MAX, RESTART_BACKOFF_BASE};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum BackoffPolicy {
    /// Always wait the spec's configured restart delay
    #[default]
    Constant,

    /// `restart_delay * factor^(failures - 1)`, capped at `max`
    Exponential { factor: u32, max: Duration },
}

impl BackoffPolicy {
    pub fn exponential() -> Self {
        BackoffPolicy::Exponential {
            factor: RESTART_BACKOFF_BASE,
            max: DEFAULT_BACKOFF_MAX,
        }
    }

    pub fn delay(&self, consecutive_failures: u32, restart_delay: Duration) -> Duration {
        match *self {
            BackoffPolicy::Constant => restart_delay,
            BackoffPolicy::Exponential { factor, max } => {
                if consecutive_failures == 0 {
                    return restart_delay.min(max);
                }
                let multiplier = factor.saturating_pow(consecutive_failures - 1);
                restart_delay
                    .checked_mul(multiplier)
                    .unwrap_or(max)
                    .min(max)
            }
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "constant" | "fixed" => Some(BackoffPolicy::Constant),
            "exponential" | "exp" => Some(BackoffPolicy::exponential()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_ignores_failure_count() {
        let policy = BackoffPolicy::Constant;
        let delay = Duration::from_millis(5000);
        for failures in 0..20 {
            assert_eq!(policy.delay(failures, delay), delay);
        }
    }

    #[test]
    fn test_exponential_growth_and_cap() {
        let policy = BackoffPolicy::Exponential {
            factor: 2,
            max: Duration::from_secs(10),
        };
        let base = Duration::from_secs(1);
        assert_eq!(policy.delay(0, base), Duration::from_secs(1));
        assert_eq!(policy.delay(1, base), Duration::from_secs(1));
        assert_eq!(policy.delay(2, base), Duration::from_secs(2));
        assert_eq!(policy.delay(3, base), Duration::from_secs(4));
        assert_eq!(policy.delay(4, base), Duration::from_secs(8));
        assert_eq!(policy.delay(5, base), Duration::from_secs(10));
        assert_eq!(policy.delay(200, base), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        assert_eq!(
            BackoffPolicy::exponential().delay(7, Duration::ZERO),
            Duration::ZERO
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(BackoffPolicy::parse("constant"), Some(BackoffPolicy::Constant));
        assert_eq!(
            BackoffPolicy::parse("Exponential"),
            Some(BackoffPolicy::exponential())
        );
        assert_eq!(BackoffPolicy::parse("linear"), None);
    }
}
