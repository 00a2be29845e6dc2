use std::fs;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::transfer::{ProcessorConfig, RetryPolicy};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub processor: ProcessorSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Transfer processor section, durations in milliseconds
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProcessorSettings {
    pub workers: usize,
    pub max_in_flight: usize,
    pub fetch_timeout_ms: u64,
    pub idle_poll_ms: u64,
    pub retry: RetrySettings,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from(&ProcessorConfig::default())
    }
}

impl From<&ProcessorConfig> for ProcessorSettings {
    fn from(config: &ProcessorConfig) -> Self {
        Self {
            workers: config.workers,
            max_in_flight: config.max_in_flight,
            fetch_timeout_ms: config.fetch_timeout.as_millis() as u64,
            idle_poll_ms: config.idle_poll.as_millis() as u64,
            retry: match config.retry {
                RetryPolicy::Immediate => RetrySettings::Immediate,
                RetryPolicy::Exponential { initial, max } => RetrySettings::Exponential {
                    initial_ms: initial.as_millis() as u64,
                    max_ms: max.as_millis() as u64,
                },
            },
        }
    }
}

impl ProcessorSettings {
    pub fn to_processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            workers: self.workers,
            max_in_flight: self.max_in_flight,
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            idle_poll: Duration::from_millis(self.idle_poll_ms),
            retry: match self.retry {
                RetrySettings::Immediate => RetryPolicy::Immediate,
                RetrySettings::Exponential { initial_ms, max_ms } => RetryPolicy::Exponential {
                    initial: Duration::from_millis(initial_ms),
                    max: Duration::from_millis(max_ms),
                },
            },
        }
    }
}

/// Fetch-cycle restart policy
///
/// ```yaml
/// retry: { policy: exponential, initial_ms: 10, max_ms: 1000 }
/// retry: { policy: immediate }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetrySettings {
    Immediate,
    Exponential { initial_ms: u64, max_ms: u64 },
}

impl AppConfig {
    /// Load `config/<env>.yaml`
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
