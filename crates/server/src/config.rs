use anyhow::{bail, Context};
use fincat_core::MAX_BATCH_SIZE;
use fincat_engine::{default_workers, BatchConfig, BatchFailureMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "FINCAT_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Bunyan-style JSON lines.
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format '{other}' (expected 'pretty' or 'json')"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_batch_size: usize,
    pub batch_workers: usize,
    pub failure_mode: BatchFailureMode,
    /// Whole-batch deadline; unset means no limit.
    pub batch_timeout_ms: Option<u64>,
    /// TOML rule table replacing the built-in pattern rules.
    pub rules_path: Option<PathBuf>,
    pub log_format: LogFormat,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_batch_size: MAX_BATCH_SIZE,
            batch_workers: default_workers(),
            failure_mode: BatchFailureMode::FailFast,
            batch_timeout_ms: None,
            rules_path: None,
            log_format: LogFormat::Pretty,
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the file named by `FINCAT_CONFIG`, then `FINCAT_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FINCAT_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("FINCAT_PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("FINCAT_PORT must be a port number, got '{port}'"))?;
        }
        if let Some(workers) = lookup("FINCAT_BATCH_WORKERS") {
            self.batch_workers = workers.trim().parse().with_context(|| {
                format!("FINCAT_BATCH_WORKERS must be a positive integer, got '{workers}'")
            })?;
        }
        if let Some(format) = lookup("FINCAT_LOG_FORMAT") {
            self.log_format = format.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_workers == 0 {
            bail!("batch_workers must be at least 1");
        }
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE {
            bail!("max_batch_size must be between 1 and {MAX_BATCH_SIZE}");
        }
        if self.batch_timeout_ms == Some(0) {
            bail!("batch_timeout_ms must be positive when set");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_size: self.max_batch_size,
            workers: self.batch_workers,
            failure_mode: self.failure_mode,
            timeout: self.batch_timeout_ms.map(Duration::from_millis),
        }
    }
}
