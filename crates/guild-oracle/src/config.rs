//! Oracle configuration.
//!
//! With no API key the Oracle runs on the length heuristic alone.

use url::Url;
use zeroize::Zeroizing;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_MAX_TOKENS: u32 = 400;

/// Configuration for the LLM scoring backend.
///
/// Custom `Debug` implementation redacts the `api_key` field.
#[derive(Clone)]
pub struct OracleConfig {
    /// Messages API key. `None` disables the LLM.
    pub api_key: Option<Zeroizing<String>>,
    /// Base URL of the Messages API.
    pub base_url: Url,
    pub model: String,
    /// Upper bound on one scoring call, including retries.
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OracleConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ORACLE_API_KEY` (optional; unset means heuristic only)
    /// - `ORACLE_BASE_URL` (default: `https://api.anthropic.com`)
    /// - `ORACLE_MODEL` (default: `claude-3-5-haiku-latest`)
    /// - `ORACLE_TIMEOUT_SECS` (default: 20)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ORACLE_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .map(Zeroizing::new);

        let raw_url = lookup("ORACLE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidUrl("ORACLE_BASE_URL".to_string(), e.to_string()))?;

        let timeout_secs = match lookup("ORACLE_TIMEOUT_SECS") {
            None => DEFAULT_TIMEOUT_SECS,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::InvalidNumber("ORACLE_TIMEOUT_SECS".to_string(), raw)),
            },
        };

        Ok(Self {
            api_key,
            base_url,
            model: lookup("ORACLE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Configuration pointing at a local mock server (for testing).
    pub fn local_mock(base_url: &str, api_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: Some(Zeroizing::new(api_key.to_string())),
            base_url: Url::parse(base_url)
                .map_err(|e| ConfigError::InvalidUrl("local_mock".to_string(), e.to_string()))?,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 5,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Whether an LLM backend is configured.
    pub fn llm_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
}
