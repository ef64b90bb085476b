use iam_core::config as core_config;
use iam_core::error::AppError;
use serde::Deserialize;
use std::env;

use crate::services::{IssuerOptions, RefreshResponse};

#[derive(Debug, Clone)]
pub struct IamConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// JWT `iss` and discovery base URL.
    pub origin: String,
    pub default_cert: String,
    pub single_use_grants: bool,
    pub refresh_response: RefreshResponse,
    /// `None` runs on the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub token_attempts: u32,
    pub token_window_seconds: u64,
}

fn config_error(msg: impl std::fmt::Display) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}

impl IamConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Builds the config from `lookup` instead of the process environment.
    pub fn from_lookup(
        common: core_config::Config,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let environment: Environment = lookup("ENVIRONMENT")
            .unwrap_or_else(|| "dev".to_string())
            .parse()
            .map_err(config_error)?;
        let is_prod = environment == Environment::Prod;
        let get = |key: &str, default: Option<&str>| get_env(&lookup, key, default, is_prod);

        let database = match lookup("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: get("DATABASE_MAX_CONNECTIONS", Some("10"))?
                    .parse()
                    .unwrap_or(10),
                min_connections: get("DATABASE_MIN_CONNECTIONS", Some("1"))?
                    .parse()
                    .unwrap_or(1),
            }),
            None if is_prod => {
                return Err(config_error(
                    "DATABASE_URL is required in production but not set",
                ))
            }
            None => None,
        };

        let config = IamConfig {
            common,
            environment: environment.clone(),
            service_name: get("SERVICE_NAME", Some("iam-service"))?,
            service_version: get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|s| !s.is_empty()),
            origin: get("IAM_ORIGIN", Some("http://localhost:8000"))?,
            default_cert: get("IAM_DEFAULT_CERT", Some("cert-built-in"))?,
            single_use_grants: get("IAM_SINGLE_USE_GRANTS", Some("true"))?
                .parse()
                .map_err(|e: std::str::ParseBoolError| {
                    config_error(format!("IAM_SINGLE_USE_GRANTS: {}", e))
                })?,
            refresh_response: get("IAM_REFRESH_RESPONSE", Some("rotated"))?
                .parse()
                .map_err(config_error)?,
            database,
            security: SecurityConfig {
                allowed_origins: get("ALLOWED_ORIGINS", Some("http://localhost:3000"))?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            rate_limit: RateLimitConfig {
                token_attempts: get("RATE_LIMIT_TOKEN_ATTEMPTS", Some("30"))?
                    .parse()
                    .unwrap_or(30),
                token_window_seconds: get("RATE_LIMIT_TOKEN_WINDOW_SECONDS", Some("60"))?
                    .parse()
                    .unwrap_or(60),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        if self.origin.trim().is_empty() {
            return Err(config_error("IAM_ORIGIN must not be empty"));
        }

        if self.rate_limit.token_attempts == 0 || self.rate_limit.token_window_seconds == 0 {
            return Err(config_error("Token rate limit must be positive"));
        }

        // A legacy refresh hands back the presented pair, which single-use
        // rotation has just revoked.
        if self.single_use_grants && self.refresh_response == RefreshResponse::Legacy {
            return Err(config_error(
                "IAM_REFRESH_RESPONSE=legacy requires IAM_SINGLE_USE_GRANTS=false",
            ));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error(
                    "Wildcard CORS origin not allowed in production",
                ));
            }

            if !self.single_use_grants {
                tracing::warn!("Single-use grants disabled in production");
            }
        }

        Ok(())
    }

    pub fn issuer_options(&self) -> IssuerOptions {
        IssuerOptions {
            single_use_grants: self.single_use_grants,
            refresh_response: self.refresh_response,
        }
    }
}

fn get_env(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Option<&str>,
    is_prod: bool,
) -> Result<String, AppError> {
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(config_error(format!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(config_error(format!("{} is required but not set", key)))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
