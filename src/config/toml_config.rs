use crate::core::retry::RetryPolicy;
use crate::utils::error::{BatchError, Result};
use crate::utils::validation::{
    require_api_key, validate_attempts, validate_base_url, validate_not_blank, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const API_KEY_ENV: &str = "YTG_API";
pub const DEFAULT_BASE_URL: &str = "https://yourtext.guru/api";

/// Settings file as written by the user. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub api: Option<ApiConfig>,
    pub retry: Option<RetryConfig>,
    pub content: Option<ContentConfig>,
    pub batch: Option<BatchConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub key: Option<String>,
    pub quality: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub guide_rate_limit_seconds: Option<u64>,
    pub rate_limit_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub guide_not_ready_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentConfig {
    pub max_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    pub propagation_wait_seconds: Option<u64>,
}

impl ScoringConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BatchError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);
        Ok(toml::from_str(&processed_content)?)
    }
}

/// Replaces `${VAR}` with the environment value; unknown variables are left as is.
fn substitute_env_vars(content: &str) -> String {
    use regex::Regex;
    use std::sync::LazyLock;

    static VAR: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

    VAR.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub quality: String,
    pub request_timeout: Duration,
}

impl ApiSettings {
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

/// Effective runtime settings: defaults, then the settings file, then the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub retry: RetryPolicy,
    pub content: ContentSettings,
    pub propagation_wait: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                base_url: DEFAULT_BASE_URL.to_string(),
                api_key: None,
                quality: "premium".to_string(),
                request_timeout: Duration::from_secs(30),
            },
            retry: RetryPolicy::default(),
            content: ContentSettings {
                max_attempts: 3,
                retry_delay: Duration::from_secs(5),
                request_timeout: Duration::from_secs(30),
            },
            propagation_wait: Duration::from_secs(60),
        }
    }
}

impl Settings {
    /// Loads the optional settings file and reads the API key from `YTG_API`.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file = match config_file {
            Some(path) => ScoringConfig::from_file(path)?,
            None => ScoringConfig::default(),
        };
        let mut settings = Self::from_config(file);
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                settings.api.api_key = Some(key);
            }
        }
        Ok(settings)
    }

    pub fn from_config(config: ScoringConfig) -> Self {
        let mut settings = Self::default();

        if let Some(api) = config.api {
            if let Some(base_url) = api.base_url {
                settings.api.base_url = base_url;
            }
            settings.api.api_key = api.key.filter(|k| !k.starts_with("${"));
            if let Some(quality) = api.quality {
                settings.api.quality = quality;
            }
            if let Some(secs) = api.request_timeout_seconds {
                settings.api.request_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(retry) = config.retry {
            let policy = &mut settings.retry;
            if let Some(max_attempts) = retry.max_attempts {
                policy.max_attempts = max_attempts;
            }
            if let Some(secs) = retry.guide_rate_limit_seconds {
                policy.guide_rate_limit_delay = Duration::from_secs(secs);
            }
            if let Some(secs) = retry.rate_limit_seconds {
                policy.rate_limit_delay = Duration::from_secs(secs);
            }
            if let Some(secs) = retry.timeout_seconds {
                policy.timeout_delay = Duration::from_secs(secs);
            }
            if let Some(secs) = retry.guide_not_ready_seconds {
                policy.guide_not_ready_delay = Duration::from_secs(secs);
            }
        }

        if let Some(content) = config.content {
            if let Some(max_attempts) = content.max_attempts {
                settings.content.max_attempts = max_attempts;
            }
            if let Some(secs) = content.retry_delay_seconds {
                settings.content.retry_delay = Duration::from_secs(secs);
            }
            if let Some(secs) = content.request_timeout_seconds {
                settings.content.request_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(secs) = config.batch.and_then(|b| b.propagation_wait_seconds) {
            settings.propagation_wait = Duration::from_secs(secs);
        }

        settings
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_base_url("api.base_url", &self.api.base_url)?;
        require_api_key(API_KEY_ENV, &self.api.api_key)?;
        validate_not_blank("api.quality", &self.api.quality)?;
        validate_attempts("retry.max_attempts", self.retry.max_attempts)?;
        validate_attempts("content.max_attempts", self.content.max_attempts)?;
        Ok(())
    }
}
