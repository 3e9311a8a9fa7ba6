use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::cli::{Cli, LogFormat};

fn default_port() -> u16 {
    8080
}

fn default_capacity() -> u64 {
    1_000_000
}

fn default_timeout() -> u64 {
    2
}

fn default_document_root() -> PathBuf {
    PathBuf::from("public_html/")
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_max_request_header_size() -> usize {
    32 * 1024
}

fn default_keepalive_idle_timeout() -> u64 {
    30
}

fn default_request_header_timeout() -> u64 {
    10
}

fn default_client_write_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_document_root")]
    pub document_root: PathBuf,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_log_format")]
    pub log: LogFormat,
    #[serde(default = "default_max_request_header_size")]
    pub max_request_header_size: usize,
    #[serde(default = "default_keepalive_idle_timeout")]
    pub keepalive_idle_timeout: u64,
    #[serde(default = "default_request_header_timeout")]
    pub request_header_timeout: u64,
    #[serde(default = "default_client_write_timeout")]
    pub client_write_timeout: u64,
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = resolve_config_path(cli) {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("STASHD")
                .separator("__")
                .try_parsing(true),
        );

        builder = builder
            .set_override_option("port", cli.port.map(i64::from))
            .map_err(to_anyhow)?
            .set_override_option("capacity", cli.capacity.map(|v| v as i64))
            .map_err(to_anyhow)?
            .set_override_option("timeout", cli.timeout.map(|v| v as i64))
            .map_err(to_anyhow)?
            .set_override_option(
                "document_root",
                cli.document_root
                    .as_ref()
                    .map(|path| path.display().to_string()),
            )
            .map_err(to_anyhow)?
            .set_override_option("debug", cli.debug.then_some(true))
            .map_err(to_anyhow)?
            .set_override_option("log", cli.log_format.map(|format| format.as_str()))
            .map_err(to_anyhow)?;

        let cfg = builder.build().map_err(to_anyhow)?;
        let settings: Settings = cfg.try_deserialize().map_err(to_anyhow)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.capacity > 0,
            "capacity must be greater than 0 bytes (got {})",
            self.capacity
        );
        ensure!(
            self.timeout > 0,
            "timeout must be greater than 0 seconds (got {})",
            self.timeout
        );
        ensure!(
            !self.document_root.as_os_str().is_empty(),
            "document_root must not be empty"
        );
        ensure!(
            self.max_request_header_size > 0,
            "max_request_header_size must be greater than 0 (got {})",
            self.max_request_header_size
        );
        ensure!(
            self.keepalive_idle_timeout > 0,
            "keepalive_idle_timeout must be greater than 0 seconds (got {})",
            self.keepalive_idle_timeout
        );
        ensure!(
            self.request_header_timeout > 0,
            "request_header_timeout must be greater than 0 seconds (got {})",
            self.request_header_timeout
        );
        ensure!(
            self.client_write_timeout > 0,
            "client_write_timeout must be greater than 0 seconds (got {})",
            self.client_write_timeout
        );
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn keepalive_idle(&self) -> Duration {
        Duration::from_secs(self.keepalive_idle_timeout)
    }

    pub fn header_timeout(&self) -> Duration {
        Duration::from_secs(self.request_header_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.client_write_timeout)
    }
}

fn to_anyhow(err: ConfigError) -> anyhow::Error {
    anyhow::anyhow!(err)
}

fn resolve_config_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(path) = cli.config.as_deref() {
        return Some(path.to_path_buf());
    }
    let candidate = Path::new("stashd.toml");
    if candidate.exists() {
        return Some(candidate.to_path_buf());
    }
    None
}
