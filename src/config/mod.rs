use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{Backoff, ExpiryMode, FailurePolicy, RetryPolicy};

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub temp_token_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub cache_retry: RetryPolicy,
    pub blacklist_failure_policy: FailurePolicy,
    pub blacklist_expiry_mode: ExpiryMode,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置，测试时无需修改进程环境变量
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        // 令牌有效期以小时为单位，允许带 h 后缀
        let jwt_expiration_secs = parse_hours("JWT_EXPIRATION", get("JWT_EXPIRATION"), 24)?;
        let temp_token_expiration_secs =
            parse_hours("TEMP_TOKEN_EXPIRATION", get("TEMP_TOKEN_EXPIRATION"), 1)?;

        let retry_delay = parse_or("CACHE_RETRY_DELAY_SECS", get("CACHE_RETRY_DELAY_SECS"), 5u64)?;
        let retry_max_delay = parse_or(
            "CACHE_RETRY_MAX_DELAY_SECS",
            get("CACHE_RETRY_MAX_DELAY_SECS"),
            60u64,
        )?;
        let backoff = parse_or("CACHE_RETRY_BACKOFF", get("CACHE_RETRY_BACKOFF"), Backoff::Fixed)?;
        let mut cache_retry = match backoff {
            Backoff::Fixed => RetryPolicy::fixed(Duration::from_secs(retry_delay)),
            Backoff::Exponential => RetryPolicy::exponential(
                Duration::from_secs(retry_delay),
                Duration::from_secs(retry_max_delay),
            ),
        };
        if let Some(raw) = get("CACHE_RETRY_MAX_ATTEMPTS") {
            let max = parse_value("CACHE_RETRY_MAX_ATTEMPTS", &raw)?;
            cache_retry = cache_retry.with_max_attempts(max);
        }

        Ok(Config {
            redis_url: get("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            jwt_secret,
            jwt_expiration_secs,
            temp_token_expiration_secs,
            server_host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or("SERVER_PORT", get("SERVER_PORT"), 3000)?,
            api_base_uri: get("API_BASE_URI").unwrap_or_else(|| "/api".to_string()),
            cache_retry,
            blacklist_failure_policy: parse_or(
                "BLACKLIST_FAILURE_POLICY",
                get("BLACKLIST_FAILURE_POLICY"),
                FailurePolicy::Open,
            )?,
            blacklist_expiry_mode: parse_or(
                "BLACKLIST_EXPIRY_MODE",
                get("BLACKLIST_EXPIRY_MODE"),
                ExpiryMode::Atomic,
            )?,
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn temp_token_expiration(&self) -> Duration {
        Duration::from_secs(self.temp_token_expiration_secs)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

/// 读取小时数并换算成秒
fn parse_hours(
    key: &'static str,
    raw: Option<String>,
    default_hours: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default_hours * 3600);
    };
    let hours: u64 = parse_value(key, raw.trim().trim_end_matches('h'))?;
    hours
        .checked_mul(3600)
        .ok_or(ConfigError::Invalid { key, value: raw })
}
