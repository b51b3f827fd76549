//! uavchat configuration.
//!
//! One TOML file at `~/.uavchat/config.toml`, every table optional. After the
//! file is read, environment variables fill in the API key and may replace
//! the provider and model. API keys are never written back out: they are
//! skipped on serialization and redacted in `Debug`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Checked in order when no `api_key` is configured.
const API_KEY_VARS: [&str; 3] = ["UAVCHAT_API_KEY", "GEMINI_API_KEY", "OPENAI_API_KEY"];

#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Shared key for every provider without its own.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Used unless `[providers.<default_provider>]` names its own model.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Stays at 0.0 so routing replies are as repeatable as the backend allows.
    #[serde(default)]
    pub default_temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Per-backend overrides keyed by provider name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_max_tokens() -> u32 {
    4096
}

fn redact(key: &Option<String>) -> &'static str {
    if key.is_some() { "[REDACTED]" } else { "None" }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("gateway", &self.gateway)
            .field("session", &self.session)
            .field("providers", &self.providers)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Largest accepted request body. Flight logs are big.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Allow any origin (browser front-ends served from elsewhere).
    #[serde(default = "default_true")]
    pub cors_allow_any: bool,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_true() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_upload_bytes: default_max_upload_bytes(),
            cors_allow_any: true,
        }
    }
}

/// Tuning for the route → answer → summarize pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of prior non-system turns shown to the router and answerer
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Refresh the running summary whenever the turn count is a multiple of this
    #[serde(default = "default_summary_interval")]
    pub summary_interval: usize,

    /// Number of recent turns (system included) folded into the summary
    #[serde(default = "default_summary_window")]
    pub summary_window: usize,

    /// Hard cap on the stored summary, in characters
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,

    /// Persona installed as the first turn of every session
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_history_window() -> usize {
    5
}
fn default_summary_interval() -> usize {
    3
}
fn default_summary_window() -> usize {
    5
}
fn default_summary_max_chars() -> usize {
    2000
}
fn default_system_prompt() -> String {
    "You are an expert UAV telemetry analyst chatbot assistant.\n\
     You help users understand UAV flight data.\n"
        .into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            summary_interval: default_summary_interval(),
            summary_window: default_summary_window(),
            summary_max_chars: default_summary_max_chars(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API, without `/chat/completions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl AppConfig {
    /// Read `~/.uavchat/config.toml` (defaults when absent), then apply the
    /// process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_dir().join("config.toml"))?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Read and validate one file. No environment lookups happen here.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// A configured `api_key` is kept; provider and model always follow
    /// `UAVCHAT_PROVIDER` / `UAVCHAT_MODEL` when set.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = API_KEY_VARS.iter().find_map(|name| lookup(*name));
        }
        if let Some(provider) = lookup("UAVCHAT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("UAVCHAT_MODEL") {
            self.default_model = model;
        }
    }

    pub fn config_dir() -> PathBuf {
        home_dir().join(".uavchat")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::ValidationError(msg.into()))
        };

        if !(0.0..=2.0).contains(&self.default_temperature) {
            return invalid("default_temperature must be between 0.0 and 2.0");
        }
        let session = &self.session;
        if session.history_window == 0 || session.summary_window == 0 {
            return invalid("session.history_window and session.summary_window must be > 0");
        }
        if session.summary_interval == 0 {
            return invalid("session.summary_interval must be > 0");
        }
        if session.summary_max_chars == 0 {
            return invalid("session.summary_max_chars must be > 0");
        }
        Ok(())
    }

    /// True when the shared key or the default provider's own key is set.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Model for the default provider: its own `default_model`, else the global one.
    pub fn effective_model(&self) -> &str {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or(&self.default_model)
    }

    /// The defaults rendered as a starter config file.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: 0.0,
            default_max_tokens: default_max_tokens(),
            gateway: GatewayConfig::default(),
            session: SessionConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn home_dir() -> PathBuf {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.session.history_window, 5);
        assert_eq!(config.session.summary_interval, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn serialized_defaults_parse_back() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("summary_interval"));
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, "gemini");
        assert_eq!(parsed.session.summary_window, 5);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_summary_interval_rejected() {
        let mut config = AppConfig::default();
        config.session.summary_interval = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("summary_interval"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "gemini-2.0-flash");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_provider = "openai"
default_model = "gpt-4o-mini"

[session]
summary_interval = 4

[providers.openai]
api_url = "http://localhost:9999/v1"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.session.summary_interval, 4);
        assert_eq!(config.session.history_window, 5);
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(
            config.providers["openai"].api_url.as_deref(),
            Some("http://localhost:9999/v1")
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_key_fills_in_only_when_unset() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("GEMINI_API_KEY", "AIza-env"), ("OPENAI_API_KEY", "sk-env")]));
        assert_eq!(config.api_key.as_deref(), Some("AIza-env"));

        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(env(&[("UAVCHAT_API_KEY", "from-env")]));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn env_overrides_provider_and_model() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("UAVCHAT_PROVIDER", "ollama"), ("UAVCHAT_MODEL", "llama3")]));
        assert_eq!(config.default_provider, "ollama");
        assert_eq!(config.default_model, "llama3");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn api_keys_are_never_serialized() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("UAVCHAT_API_KEY", "AIza-shared-secret")]));
        config.providers.insert(
            "gemini".into(),
            ProviderConfig {
                api_key: Some("AIza-provider-secret".into()),
                api_url: Some("http://127.0.0.1:9000/v1".into()),
                default_model: None,
            },
        );

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(!toml_str.contains("api_key"));
        assert!(!toml_str.contains("secret"));
        assert!(toml_str.contains("http://127.0.0.1:9000/v1"));
    }

    #[test]
    fn provider_model_overrides_global_model() {
        let mut config = AppConfig::default();
        assert_eq!(config.effective_model(), "gemini-2.0-flash");

        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: None,
                api_url: None,
                default_model: Some("gpt-4o".into()),
            },
        );
        assert_eq!(config.effective_model(), "gemini-2.0-flash");

        config.providers.insert(
            "gemini".into(),
            ProviderConfig {
                api_key: None,
                api_url: None,
                default_model: Some("gemini-1.5-pro".into()),
            },
        );
        assert_eq!(config.effective_model(), "gemini-1.5-pro");
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = AppConfig {
            api_key: Some("AIza-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("AIza-secret"));
    }
}
