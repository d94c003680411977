use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_REASONING_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_HISTORY_PATH: &str = "data/sessions.json";
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
pub const ENV_REASONING_PROVIDER: &str = "MOOD_REASONING_PROVIDER";
pub const ENV_REASONING_TIMEOUT_MS: &str = "MOOD_REASONING_TIMEOUT_MS";
pub const ENV_HISTORY_PATH: &str = "MOOD_HISTORY_PATH";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_ANTHROPIC_MODEL: &str = "ANTHROPIC_MODEL";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_ANTHROPIC_BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const ENV_GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";

/// Which implementation answers trend questions.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningProvider {
    /// Deterministic rules only, no backend is contacted.
    #[default]
    Statistical,
    Anthropic,
    Gemini,
}

impl ReasoningProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningProvider::Statistical => "statistical",
            ReasoningProvider::Anthropic => "anthropic",
            ReasoningProvider::Gemini => "gemini",
        }
    }
}

impl FromStr for ReasoningProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "statistical" | "none" | "" => Ok(ReasoningProvider::Statistical),
            "anthropic" => Ok(ReasoningProvider::Anthropic),
            "gemini" => Ok(ReasoningProvider::Gemini),
            other => Err(ConfigError::UnknownProvider(other.to_owned())),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeys {
    pub anthropic: Option<ApiKey>,
    pub gemini: Option<ApiKey>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningConfig {
    pub provider: ReasoningProvider,
    pub api_keys: ApiKeys,
    pub anthropic_model: String,
    pub gemini_model: String,
    /// Overrides the public endpoint, e.g. for a proxy.
    pub anthropic_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
    pub timeout_ms: u64,
}

impl ReasoningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Fails when a delegating provider is selected without its key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let missing = match self.provider {
            ReasoningProvider::Statistical => None,
            ReasoningProvider::Anthropic if self.api_keys.anthropic.is_none() => {
                Some(ENV_ANTHROPIC_API_KEY)
            }
            ReasoningProvider::Gemini if self.api_keys.gemini.is_none() => Some(ENV_GEMINI_API_KEY),
            _ => None,
        };
        match missing {
            Some(key) => Err(ConfigError::MissingApiKey {
                provider: self.provider.as_str(),
                env_key: key,
            }),
            None => Ok(()),
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: ReasoningProvider::default(),
            api_keys: ApiKeys::default(),
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.to_owned(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_owned(),
            anthropic_base_url: None,
            gemini_base_url: None,
            timeout_ms: DEFAULT_REASONING_TIMEOUT_MS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub reasoning: ReasoningConfig,
    pub history_path: PathBuf,
    pub history_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reasoning: ReasoningConfig::default(),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("reasoning timeout must be > 0 ms")]
    ZeroTimeout,
    #[error("unknown reasoning provider `{0}` (expected statistical, anthropic or gemini)")]
    UnknownProvider(String),
    #[error("provider {provider} needs an api key (set {env_key})")]
    MissingApiKey {
        provider: &'static str,
        env_key: &'static str,
    },
    #[error("{key} must be an integer, got `{value}`")]
    NotAnInteger { key: &'static str, value: String },
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiKey::new(v)?)),
            None => Ok(None),
        },
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    cli_value
        .or_else(|| env.var(env_key))
        .filter(|v| !v.trim().is_empty())
}

pub fn resolve_u64_with_default(
    cli_value: Option<u64>,
    env_key: &'static str,
    env: &impl Env,
    default: u64,
) -> Result<u64, ConfigError> {
    if let Some(v) = cli_value {
        return Ok(v);
    }
    match env.var(env_key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::NotAnInteger {
            key: env_key,
            value: raw,
        }),
        None => Ok(default),
    }
}

pub fn resolve_provider(
    cli_value: Option<String>,
    env: &impl Env,
) -> Result<ReasoningProvider, ConfigError> {
    match cli_value.or_else(|| env.var(ENV_REASONING_PROVIDER)) {
        Some(v) => v.parse(),
        None => Ok(ReasoningProvider::default()),
    }
}
