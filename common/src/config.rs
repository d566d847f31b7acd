//! Application configuration.
//!
//! Everything is read from environment variables. Call [`load_dotenv`] first
//! to pick up a `.env` file from the working directory.

use std::fmt;

use crate::errors::{AppError, AppResult};
use crate::models::connection::{ConnectionConfig, DbType};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8501;
const DEFAULT_TITLE: &str = "Retail Sales Question Answering App";
const DEFAULT_MODEL: &str = "gemini-pro";
const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name reported in responses and logs.
    pub service_name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Page title.
    pub title: String,
    /// Sales database connection.
    pub database: ConnectionConfig,
    /// Language model settings.
    pub llm: LlmConfig,
    /// Sample rows per table included in the schema summary.
    pub sample_rows: u32,
    /// Reject statements that do not only read data.
    pub read_only: bool,
}

/// Language model settings.
#[derive(Clone)]
pub struct LlmConfig {
    /// API key for the hosted model.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Default row limit the prompt asks the model to respect.
    pub top_k: u32,
    /// Optional HTTP timeout; no timeout when absent.
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("top_k", &self.top_k)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    /// Returns `AppError::Config` when `GOOGLE_API_KEY` is missing or a value
    /// cannot be parsed.
    pub fn load_with_service(service_name: &str) -> AppResult<Self> {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_type = match get("DB_TYPE") {
            Some(raw) => raw.parse::<DbType>()?,
            None => DbType::MySQL,
        };

        let database = ConnectionConfig {
            db_type,
            host: get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_opt(&get, "DB_PORT")?,
            username: get("DB_USER").unwrap_or_else(|| "root".to_string()),
            // Passwords may legitimately be whitespace, so read them raw.
            password: lookup("DB_PASSWORD").unwrap_or_default(),
            database: get("DB_NAME").unwrap_or_else(|| "retail_sales_db".to_string()),
            file_path: get("DB_PATH"),
            max_connections: parse_opt(&get, "DB_MAX_CONNECTIONS")?.unwrap_or(5),
            connect_timeout_secs: parse_opt(&get, "DB_CONNECT_TIMEOUT_SECS")?.unwrap_or(10),
        };

        let api_key = get("GOOGLE_API_KEY").ok_or_else(|| {
            AppError::Config("GOOGLE_API_KEY environment variable not set".to_string())
        })?;

        let llm = LlmConfig {
            api_key,
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            top_k: parse_opt(&get, "LLM_TOP_K")?.unwrap_or(5),
            timeout_secs: parse_opt(&get, "LLM_TIMEOUT_SECS")?,
        };

        Ok(Self {
            service_name: service_name.to_string(),
            host: get("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_opt(&get, "SERVER_PORT")?.unwrap_or(DEFAULT_PORT),
            title: get("APP_TITLE").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            database,
            llm,
            sample_rows: parse_opt(&get, "SAMPLE_ROWS")?.unwrap_or(3),
            read_only: parse_bool(&get, "READ_ONLY")?.unwrap_or(true),
        })
    }

    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads `.env` from the working directory if present.
///
/// Variables already set in the environment win over the file.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }
}

fn parse_opt<T, F>(get: &F, key: &str) -> AppResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| AppError::Config(format!("invalid {}={:?}: {}", key, raw, e)))
        })
        .transpose()
}

fn parse_bool<F>(get: &F, key: &str) -> AppResult<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Config(format!("invalid {}={:?}", key, raw))),
        })
        .transpose()
}
