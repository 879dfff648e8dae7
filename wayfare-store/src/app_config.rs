use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub backend_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 { 30 }

/// External auth provider (GoTrue-compatible REST API)
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    /// Remaining lifetime under which `access_token()` refreshes first
    #[serde(default = "default_on_demand_threshold")]
    pub on_demand_threshold_seconds: u64,
    /// Remaining lifetime under which the timer (and startup) refreshes
    #[serde(default = "default_proactive_threshold")]
    pub proactive_threshold_seconds: u64,
}

fn default_refresh_interval() -> u64 { 300 }
fn default_on_demand_threshold() -> u64 { 300 }
fn default_proactive_threshold() -> u64 { 600 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: default_refresh_interval(),
            on_demand_threshold_seconds: default_on_demand_threshold(),
            proactive_threshold_seconds: default_proactive_threshold(),
        }
    }
}

impl SessionConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    pub fn on_demand_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.on_demand_threshold_seconds as i64)
    }

    pub fn proactive_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.proactive_threshold_seconds as i64)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON files under `data_dir`
    #[default]
    File,
    /// Process-local, for tests
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub redis_url: Option<String>,
}

fn default_data_dir() -> PathBuf { PathBuf::from(".wayfare") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: StorageBackend::default(), data_dir: default_data_dir(), redis_url: None }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_selling_fast")]
    pub selling_fast_threshold: u32,
}

fn default_selling_fast() -> u32 { 10 }

impl Default for StreamConfig {
    fn default() -> Self {
        Self { selling_fast_threshold: default_selling_fast() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_recent_limit() -> usize { 5 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self { recent_limit: default_recent_limit() }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Machine-local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `WAYFARE__API__BACKEND_URL=http://localhost:3000`
            .add_source(config::Environment::with_prefix("WAYFARE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
