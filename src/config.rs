use crate::paper::PaperConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "dashboard.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub setter: SetterConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TerminalBackend {
    Paper,
    Tws,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default = "default_backend")]
    pub backend: TerminalBackend,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_summary_tick_ms")]
    pub summary_tick_ms: u64,
    #[serde(default = "default_summary_budget_ms")]
    pub summary_budget_ms: u64,
    #[serde(default = "default_details_tick_ms")]
    pub details_tick_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetterConfig {
    #[serde(default = "default_magic")]
    pub magic: u64,
    #[serde(default = "default_comment")]
    pub comment: String,
    #[serde(default = "default_price_tolerance")]
    pub price_tolerance: f64,
    #[serde(default = "default_submit_delay_ms")]
    pub submit_delay_ms: u64,
    #[serde(default = "default_apply_pause_ms")]
    pub apply_pause_ms: u64,
    #[serde(default = "default_invalid_input_pause_ms")]
    pub invalid_input_pause_ms: u64,
}

fn default_backend() -> TerminalBackend {
    TerminalBackend::Paper
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7497 // paper trading port
}
fn default_client_id() -> i32 {
    1
}

fn default_summary_tick_ms() -> u64 {
    10
}
fn default_summary_budget_ms() -> u64 {
    1000
}
fn default_details_tick_ms() -> u64 {
    50
}

fn default_magic() -> u64 {
    234000
}
fn default_comment() -> String {
    "Bulk TP/SL Setter".to_string()
}
fn default_price_tolerance() -> f64 {
    0.00001
}
fn default_submit_delay_ms() -> u64 {
    200
}
fn default_apply_pause_ms() -> u64 {
    500
}
fn default_invalid_input_pause_ms() -> u64 {
    1000
}

fn default_log_file() -> String {
    "tpsl-dashboard.log".to_string()
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            summary_tick_ms: default_summary_tick_ms(),
            summary_budget_ms: default_summary_budget_ms(),
            details_tick_ms: default_details_tick_ms(),
        }
    }
}

impl RefreshConfig {
    pub fn summary_tick(&self) -> Duration {
        Duration::from_millis(self.summary_tick_ms)
    }

    /// Key polls per summary refresh, at least one.
    pub fn summary_ticks(&self) -> u64 {
        (self.summary_budget_ms / self.summary_tick_ms.max(1)).max(1)
    }

    pub fn details_tick(&self) -> Duration {
        Duration::from_millis(self.details_tick_ms)
    }
}

impl Default for SetterConfig {
    fn default() -> Self {
        Self {
            magic: default_magic(),
            comment: default_comment(),
            price_tolerance: default_price_tolerance(),
            submit_delay_ms: default_submit_delay_ms(),
            apply_pause_ms: default_apply_pause_ms(),
            invalid_input_pause_ms: default_invalid_input_pause_ms(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            terminal: TerminalConfig::default(),
            refresh: RefreshConfig::default(),
            setter: SetterConfig::default(),
            paper: PaperConfig::default(),
            log_file: default_log_file(),
        }
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    File,
    Defaults,
}

impl DashboardConfig {
    /// Read a JSON config; a missing file means built-in defaults.
    ///
    /// Runs before logging is set up, so the origin is returned for the
    /// caller to log.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<(Self, ConfigOrigin)> {
        let path = path.as_ref();
        let config_str = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok((Self::default(), ConfigOrigin::Defaults));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };

        let config: DashboardConfig = serde_json::from_str(&config_str)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok((config, ConfigOrigin::File))
    }
}
