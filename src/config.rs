use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;

use crate::context::ContextStrategy;
use crate::db::{Database, StoreError};
use crate::llm::ProviderError;

pub const APP_NAME: &str = "mortgage-advisor";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Settings-table key and the environment variable that overrides it.
pub const SETTING_SOURCES: &[(&str, &str)] = &[
    ("openai_api_key", "OPENAI_API_KEY"),
    ("openai_base_url", "OPENAI_BASE_URL"),
    ("chat_model", "MORTGAGE_ADVISOR_CHAT_MODEL"),
    ("embedding_model", "MORTGAGE_ADVISOR_EMBEDDING_MODEL"),
    ("embedding_dimensions", "MORTGAGE_ADVISOR_EMBEDDING_DIMENSIONS"),
    ("context_strategy", "MORTGAGE_ADVISOR_CONTEXT"),
    ("request_timeout_secs", "MORTGAGE_ADVISOR_TIMEOUT_SECS"),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Cannot determine a data directory; set MORTGAGE_ADVISOR_DB")]
    NoDataDir,
    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),
}

/// Connection details for one hosted provider.
///
/// A missing `api_key` is a supported state: clients switch to their
/// offline fallback instead of failing.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: String,
    pub timeout: Option<Duration>,
}

impl ProviderConfig {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn http_client(&self) -> Result<Client, ProviderError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub completion: ProviderConfig,
    pub embedding: ProviderConfig,
    /// Explicit vector length. `None` keeps the model's native size and
    /// leaves the `dimensions` field out of embedding requests.
    pub embedding_dimensions: Option<usize>,
    pub context_strategy: ContextStrategy,
}

impl AppConfig {
    /// Resolve from the process environment, then the settings table.
    pub fn load(db: &Database) -> Result<Self, ConfigError> {
        Self::resolve(db, |name| std::env::var(name).ok())
    }

    /// Resolve each setting from `env`, then the settings table, then the
    /// built-in default.
    pub fn resolve(
        db: &Database,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| -> Result<Option<String>, ConfigError> {
            let from_env = SETTING_SOURCES
                .iter()
                .find(|(k, _)| *k == key)
                .and_then(|(_, var)| env(*var))
                .filter(|v| !v.trim().is_empty());
            match from_env {
                Some(value) => Ok(Some(value)),
                None => Ok(db.get_setting(key)?),
            }
        };

        let api_key = lookup("openai_api_key")?;
        let endpoint = lookup("openai_base_url")?;
        let timeout = lookup("request_timeout_secs")?
            .map(|v| parse_number::<u64>("request_timeout_secs", &v))
            .transpose()?
            .map(Duration::from_secs);

        let embedding_dimensions = lookup("embedding_dimensions")?
            .map(|v| parse_number::<usize>("embedding_dimensions", &v))
            .transpose()?;
        if embedding_dimensions == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "embedding_dimensions".into(),
                value: "0".into(),
            });
        }

        let context_strategy = match lookup("context_strategy")? {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "context_strategy".into(),
                value: v,
            })?,
            None => ContextStrategy::default(),
        };

        Ok(Self {
            completion: ProviderConfig {
                api_key: api_key.clone(),
                endpoint: endpoint.clone(),
                model: lookup("chat_model")?.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
                timeout,
            },
            embedding: ProviderConfig {
                api_key,
                endpoint,
                model: lookup("embedding_model")?
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                timeout,
            },
            embedding_dimensions,
            context_strategy,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// `MORTGAGE_ADVISOR_DB`, else `<platform data dir>/mortgage-advisor/`.
pub fn database_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os("MORTGAGE_ADVISOR_DB") {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(dir.join(APP_NAME).join("mortgage-advisor.db"))
}

pub fn default_log_filter() -> &'static str {
    "mortgage_advisor_lib=info,mortgage_advisor=info,warn"
}
