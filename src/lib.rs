pub mod api;
pub mod client;
pub mod error;
pub mod logging;
pub mod registry;
pub mod trigger;
pub mod ui;

use axum::{Router, routing};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use client::PipelineClient;
use error::{Result, TriggerError};
use registry::{ConfigRegistry, RepoConfig};
use trigger::OptionPolicy;

/// Environment variable holding the pipeline trigger token
pub const TOKEN_ENV_VAR: &str = "GITLAB_TRIGGER_TOKEN";

pub const DEFAULT_ENDPOINT_URL: &str =
    "https://gitlab-master.nvidia.com/api/v4/projects/168253/trigger/pipeline";
pub const DEFAULT_REF: &str = "hchodhary/feat-create-dynamic-gitlab-ci-page";

#[derive(Debug, Deserialize, Clone)]
pub struct TriggerConfig {
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    #[serde(rename = "ref", default = "default_ref")]
    pub git_ref: String,
    #[serde(default)]
    pub strict_options: bool,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub repo: Vec<RepoConfig>,
}

fn default_endpoint_url() -> String {
    DEFAULT_ENDPOINT_URL.to_string()
}

fn default_ref() -> String {
    DEFAULT_REF.to_string()
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            git_ref: default_ref(),
            strict_options: false,
            timeout_secs: None,
            repo: Vec::new(),
        }
    }
}

impl TriggerConfig {
    pub fn option_policy(&self) -> OptionPolicy {
        if self.strict_options {
            OptionPolicy::Strict
        } else {
            OptionPolicy::Permissive
        }
    }

    /// Client-side request timeout; None leaves the request unbounded
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Registry from the `[[repo]]` tables, or the built-in one when none are declared
    pub fn registry(&self) -> Result<ConfigRegistry> {
        if self.repo.is_empty() {
            Ok(ConfigRegistry::builtin().clone())
        } else {
            ConfigRegistry::new(self.repo.clone())
        }
    }
}

/// Load and parse the configuration file. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<TriggerConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No config file at {:?}, using built-in defaults", path);
        return Ok(TriggerConfig::default());
    }

    let config_str = std::fs::read_to_string(path).map_err(|e| {
        TriggerError::ConfigError(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    parse_config(&config_str).map_err(|e| match e {
        TriggerError::TomlParseError(e) => TriggerError::ConfigError(format!(
            "Failed to parse config file {:?}: {}",
            path, e
        )),
        other => other,
    })
}

pub fn parse_config(config_str: &str) -> Result<TriggerConfig> {
    let config: TriggerConfig = toml::from_str(config_str)?;
    if config.endpoint_url.is_empty() {
        return Err(TriggerError::ConfigError(
            "endpoint_url must not be empty".to_string(),
        ));
    }
    if config.timeout_secs == Some(0) {
        return Err(TriggerError::ConfigError(
            "timeout_secs must be greater than zero; omit it for no timeout".to_string(),
        ));
    }
    // Validate the repo tables up front so a bad file fails at startup
    config.registry()?;
    Ok(config)
}

/// Read the trigger token from the environment; absent or empty is fatal
pub fn read_token() -> Result<SecretString> {
    token_from(std::env::var(TOKEN_ENV_VAR).ok())
}

fn token_from(value: Option<String>) -> Result<SecretString> {
    match value {
        Some(token) if !token.is_empty() => Ok(SecretString::from(token)),
        _ => Err(TriggerError::MissingCredential(TOKEN_ENV_VAR.to_string())),
    }
}

pub struct AppState {
    pub config: TriggerConfig,
    pub registry: ConfigRegistry,
    pub client: PipelineClient,
    pub secret_token: SecretString,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: TriggerConfig, secret_token: SecretString) -> Result<Self> {
        let registry = config.registry()?;
        let client = PipelineClient::new(config.timeout())?;
        Ok(Self {
            config,
            registry,
            client,
            secret_token,
            start_time: Instant::now(),
            started_at: Utc::now(),
        })
    }
}

pub type SharedState = Arc<AppState>;

/// All routes: JSON API plus the embedded form page
pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/health", routing::get(api::root))
        .route("/api/repos", routing::get(api::list_repos))
        .route("/api/repos/{repo_id}", routing::get(api::get_repo))
        .route("/api/trigger", routing::post(api::trigger_pipeline))
        .fallback(ui::serve_ui)
        .with_state(state)
}
