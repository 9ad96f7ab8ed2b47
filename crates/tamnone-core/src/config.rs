//! Relay configuration: defaults, optional TOML file, then `TAMNONE_*` environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prediction::{TuningParameters, DEFAULT_ALPHA, DEFAULT_STEPS, DEFAULT_Z};
use crate::space_client::space_url;

pub const DEFAULT_SPACE_ID: &str = "leewatson/kshs33_emotion_predict";

/// Gateway configuration.
///
/// | Key | Env | Default |
/// |-----|-----|---------|
/// | bind_addr | TAMNONE_BIND_ADDR | 0.0.0.0:5000 |
/// | space_id | TAMNONE_SPACE_ID | leewatson/kshs33_emotion_predict |
/// | space_url | TAMNONE_SPACE_URL | derived from space_id |
/// | api_name | TAMNONE_API_NAME | /predict |
/// | hf_token | TAMNONE_HF_TOKEN or HF_TOKEN | none |
/// | alpha / z / steps | TAMNONE_ALPHA / TAMNONE_Z / TAMNONE_STEPS | 0.1 / 1.0 / 1 |
/// | request_timeout_secs | TAMNONE_REQUEST_TIMEOUT_SECS | 60 |
/// | history_path | TAMNONE_HISTORY_PATH | none (in-memory only) |
/// | probe_on_startup | TAMNONE_PROBE_ON_STARTUP | true |
/// | cors_permissive | TAMNONE_CORS_PERMISSIVE | true |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub space_id: String,
    /// Explicit Space base URL; wins over the one derived from `space_id`.
    #[serde(default)]
    pub space_url: Option<String>,
    pub api_name: String,
    #[serde(default)]
    pub hf_token: Option<String>,
    pub alpha: f64,
    pub z: f64,
    pub steps: i64,
    pub request_timeout_secs: u64,
    /// Directory of the sled history db. Unset keeps history in memory only.
    #[serde(default)]
    pub history_path: Option<String>,
    pub probe_on_startup: bool,
    pub cors_permissive: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            space_id: DEFAULT_SPACE_ID.to_string(),
            space_url: None,
            api_name: "/predict".to_string(),
            hf_token: None,
            alpha: DEFAULT_ALPHA,
            z: DEFAULT_Z,
            steps: DEFAULT_STEPS,
            request_timeout_secs: 60,
            history_path: None,
            probe_on_startup: true,
            cors_permissive: true,
        }
    }
}

impl RelayConfig {
    /// Load config from file and environment. File path: env `TAMNONE_CONFIG`, else `config/relay`
    /// (`.toml` implied). `HF_TOKEN` is honored when no token is configured.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("TAMNONE_CONFIG").unwrap_or_else(|_| "config/relay".to_string());
        let mut cfg = Self::load_from(Some(Path::new(&config_path)))?;
        if cfg.hf_token.is_none() {
            cfg.hf_token = std::env::var("HF_TOKEN")
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
        }
        Ok(cfg)
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let d = Self::default();
        let builder = config::Config::builder()
            .set_default("bind_addr", d.bind_addr)?
            .set_default("space_id", d.space_id)?
            .set_default("api_name", d.api_name)?
            .set_default("alpha", d.alpha)?
            .set_default("z", d.z)?
            .set_default("steps", d.steps)?
            .set_default("request_timeout_secs", d.request_timeout_secs)?
            .set_default("probe_on_startup", d.probe_on_startup)?
            .set_default("cors_permissive", d.cors_permissive)?;

        let builder = match path {
            Some(p) => builder.add_source(config::File::from(p).required(false)),
            None => builder,
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("TAMNONE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        built.try_deserialize()
    }

    pub fn tuning_defaults(&self) -> TuningParameters {
        TuningParameters {
            alpha: self.alpha,
            z: self.z,
            steps: self.steps,
        }
    }

    pub fn resolved_space_url(&self) -> String {
        match self.space_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => space_url(&self.space_id),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
