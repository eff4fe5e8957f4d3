use std::time::Duration;

use thiserror::Error;

pub const STORE_TIMEOUT_VAR: &str = "SR_STORE_TIMEOUT_MS";
pub const QUEUE_TIMEOUT_VAR: &str = "SR_QUEUE_TIMEOUT_MS";
pub const MAX_PIPELINES_VAR: &str = "SR_MAX_PIPELINES";

#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    /// Deadline for a single record write.
    pub store_timeout: Duration,
    /// Deadline for a single audit batch submission.
    pub queue_timeout: Duration,
    /// Upper bound on farmer pipelines running at once.
    pub max_concurrent_pipelines: usize,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(10),
            queue_timeout: Duration::from_secs(10),
            max_concurrent_pipelines: 16,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value '{value}' for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl RegistrarConfig {
    /// Defaults overridden by `SR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(ms) = parse_var(&lookup, STORE_TIMEOUT_VAR)? {
            config.store_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, QUEUE_TIMEOUT_VAR)? {
            config.queue_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var(&lookup, MAX_PIPELINES_VAR)? {
            if max == 0 {
                return Err(ConfigError {
                    var: MAX_PIPELINES_VAR,
                    value: max.to_string(),
                    reason: "must be at least 1".into(),
                });
            }
            config.max_concurrent_pipelines = max as usize;
        }
        Ok(config)
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value.trim().parse::<u64>().map(Some).map_err(|e| ConfigError {
        var,
        value,
        reason: e.to_string(),
    })
}
