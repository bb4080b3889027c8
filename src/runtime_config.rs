//! # Runtime Configuration Module
//!
//! Settings that shape how a frozen pipeline and its server adapter behave.
//!
//! ## Sources
//!
//! 1. Built-in defaults
//! 2. A YAML file ([`RuntimeConfig::from_yaml_file`])
//! 3. Environment variables, which override the file ([`RuntimeConfig::load`])
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `SWITCHYARD_CONTEXT_STORAGE` | `context_storage` | `false` |
//! | `SWITCHYARD_SLOW_MATCH_US` | `slow_match_threshold_us` | `1000` |
//! | `SWITCHYARD_STACK_SIZE` | `stack_size` | `0x8000` |
//! | `SWITCHYARD_REQUEST_ID_HEADER` | `request_id_header` | `x-request-id` |
//!
//! `SWITCHYARD_STACK_SIZE` accepts decimal (`32768`) or hex (`0x8000`).
//! Unparseable values are ignored and the previous value is kept.
//!
//! ## Example
//!
//! ```yaml
//! context_storage: true
//! slow_match_threshold_us: 250
//! stack_size: 0x10000
//! ```
//!
//! ```rust,ignore
//! let config = RuntimeConfig::load(Some(Path::new("config/runtime.yaml")))?;
//! let pipeline = builder.with_config(config).freeze();
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

use crate::context::DEFAULT_REQUEST_ID_HEADER;

pub const ENV_CONTEXT_STORAGE: &str = "SWITCHYARD_CONTEXT_STORAGE";
pub const ENV_SLOW_MATCH_US: &str = "SWITCHYARD_SLOW_MATCH_US";
pub const ENV_STACK_SIZE: &str = "SWITCHYARD_STACK_SIZE";
pub const ENV_REQUEST_ID_HEADER: &str = "SWITCHYARD_REQUEST_ID_HEADER";

pub const DEFAULT_STACK_SIZE: usize = 0x8000;
pub const DEFAULT_SLOW_MATCH_US: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Create ambient context storage when the pipeline is frozen.
    pub context_storage: bool,
    /// Route matches slower than this are logged at `warn`.
    pub slow_match_threshold_us: u64,
    /// Coroutine stack size used by the server adapter.
    #[serde(deserialize_with = "de_stack_size")]
    pub stack_size: usize,
    /// Header trusted for incoming request ids.
    pub request_id_header: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            context_storage: false,
            slow_match_threshold_us: DEFAULT_SLOW_MATCH_US,
            stack_size: DEFAULT_STACK_SIZE,
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid runtime configuration")
    }

    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// File values (when a path is given) overridden by environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    #[must_use]
    pub fn slow_match_threshold(&self) -> Duration {
        Duration::from_micros(self.slow_match_threshold_us)
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = env::var(ENV_CONTEXT_STORAGE) {
            match parse_bool(&raw) {
                Some(value) => self.context_storage = value,
                None => warn!(var = ENV_CONTEXT_STORAGE, value = %raw, "Ignoring invalid boolean"),
            }
        }
        if let Ok(raw) = env::var(ENV_SLOW_MATCH_US) {
            match raw.trim().parse() {
                Ok(value) => self.slow_match_threshold_us = value,
                Err(_) => warn!(var = ENV_SLOW_MATCH_US, value = %raw, "Ignoring invalid integer"),
            }
        }
        if let Ok(raw) = env::var(ENV_STACK_SIZE) {
            match parse_size(&raw) {
                Some(value) => self.stack_size = value,
                None => warn!(var = ENV_STACK_SIZE, value = %raw, "Ignoring invalid stack size"),
            }
        }
        if let Ok(raw) = env::var(ENV_REQUEST_ID_HEADER) {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.request_id_header = raw.to_ascii_lowercase();
            }
        }
    }
}

/// Decimal or `0x`-prefixed hex.
#[must_use]
pub fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn de_stack_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(usize),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => parse_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid stack size \"{s}\""))),
    }
}
