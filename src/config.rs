use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

use crate::dispatcher::RetryPolicy;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    pub bind_addr: String,
    pub oracle_url: String,
    pub oracle_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            oracle_url: "http://localhost:5000/predict".to_string(),
            oracle_timeout_ms: 5_000,
            max_retries: 0,
            retry_backoff_ms: 200,
        }
    }
}

impl DispatchConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&data)
            .with_context(|| format!("invalid config JSON in {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// File named by `DISPATCH_CONFIG` (if set), then env var overrides.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var("DISPATCH_CONFIG") {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port.parse().with_context(|| format!("PORT={port} is not a port number"))?;
            let host = self
                .bind_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.bind_addr = format!("{host}:{port}");
        }
        if let Some(url) = lookup("ORACLE_URL") {
            self.oracle_url = url;
        }
        if let Some(v) = lookup("ORACLE_TIMEOUT_MS") {
            self.oracle_timeout_ms = v.parse().with_context(|| format!("ORACLE_TIMEOUT_MS={v}"))?;
        }
        if let Some(v) = lookup("ORACLE_MAX_RETRIES") {
            self.max_retries = v.parse().with_context(|| format!("ORACLE_MAX_RETRIES={v}"))?;
        }
        if let Some(v) = lookup("ORACLE_RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = v.parse().with_context(|| format!("ORACLE_RETRY_BACKOFF_MS={v}"))?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.oracle_timeout_ms == 0 {
            anyhow::bail!("oracle_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}
