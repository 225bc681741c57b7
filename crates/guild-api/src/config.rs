//! # Service Configuration
//!
//! Read once at startup from environment variables. Invalid values are
//! reported as [`ConfigError`] rather than silently replaced.
//!
//! | Variable                 | Default                     |
//! |--------------------------|-----------------------------|
//! | `PORT`                   | 8080                        |
//! | `GUILD_API_KEY`          | unset (auth disabled)       |
//! | `DATABASE_URL`           | unset (in-memory ledger)    |
//! | `SETTLEMENT_CONCURRENCY` | 8                           |
//! | `METRICS_ENABLED`        | true                        |
//! | `LOG_FORMAT`             | text                        |
//! | `ORACLE_*`               | see [`guild_oracle::OracleConfig`] |

use guild_oracle::OracleConfig;
use zeroize::Zeroizing;

use crate::auth::SecretToken;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SETTLEMENT_CONCURRENCY: usize = 8;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration.
///
/// Custom `Debug` redacts the database URL, which usually embeds a password.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Static bearer token. `None` disables authentication.
    pub auth_token: Option<SecretToken>,
    pub database_url: Option<Zeroizing<String>>,
    /// Parallel settlement jobs.
    pub settlement_concurrency: usize,
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
    pub oracle: OracleConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("settlement_concurrency", &self.settlement_concurrency)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("log_format", &self.log_format)
            .field("oracle", &self.oracle)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or("PORT", &lookup, DEFAULT_PORT)?;

        let settlement_concurrency =
            parse_or("SETTLEMENT_CONCURRENCY", &lookup, DEFAULT_SETTLEMENT_CONCURRENCY)?;
        if settlement_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "SETTLEMENT_CONCURRENCY".to_string(),
                "0".to_string(),
            ));
        }

        let metrics_enabled = match lookup("METRICS_ENABLED") {
            None => true,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(ConfigError::InvalidValue("METRICS_ENABLED".to_string(), raw)),
            },
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "LOG_FORMAT".to_string(),
                    other.to_string(),
                ))
            }
        };

        Ok(Self {
            port,
            auth_token: lookup("GUILD_API_KEY")
                .filter(|t| !t.trim().is_empty())
                .map(SecretToken::new),
            database_url: lookup("DATABASE_URL")
                .filter(|u| !u.trim().is_empty())
                .map(Zeroizing::new),
            settlement_concurrency,
            metrics_enabled,
            log_format,
            oracle: OracleConfig::from_lookup(&lookup)?,
        })
    }
}

fn parse_or<T, F>(var: &str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(var.to_string(), raw)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(String, String),
    #[error(transparent)]
    Oracle(#[from] guild_oracle::ConfigError),
}
