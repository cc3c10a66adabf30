//! Configuration loading for the enlist gateway and orchestrator.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `ENLIST_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::auth::Credential;

/// Upper bound accepted for `ENLIST_LISTING_MAX_PAGES`.
pub const MAX_LISTING_PAGES: u32 = 100_000;

/// Application configuration derived from `ENLIST_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
}

/// Remote platform settings used by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct UpstreamConfig {
    /// Base URL of the remote platform API (default: `https://platform.synack.com`)
    ///
    /// Environment variable: `ENLIST_UPSTREAM_BASE_URL`
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds (default: 30000)
    ///
    /// Environment variable: `ENLIST_UPSTREAM_TIMEOUT_MS`
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,

    /// Hard ceiling on listing pages fetched by one aggregation (default: 500)
    ///
    /// Environment variable: `ENLIST_LISTING_MAX_PAGES`
    #[serde(default = "default_listing_max_pages")]
    pub listing_max_pages: u32,

    /// Body sent with every signup request.
    ///
    /// Environment variable: `ENLIST_REGISTRATION_PAYLOAD` (JSON object)
    #[serde(default = "default_registration_payload")]
    pub registration_payload: serde_json::Value,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RegistrationConfig {
    /// Categories the caller is qualified for.
    ///
    /// Environment variable: `ENLIST_ELIGIBLE_CATEGORIES` (comma-separated)
    #[serde(default = "default_eligible_categories")]
    pub eligible_categories: Vec<String>,

    /// Fixed delay between registration attempts in milliseconds (default: 150)
    ///
    /// Environment variable: `ENLIST_REGISTER_DELAY_MS`
    #[serde(default = "default_register_delay_ms")]
    pub delay_ms: u64,

    /// Base URL the orchestrator uses to reach the gateway.
    ///
    /// Environment variable: `ENLIST_GATEWAY_URL`
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Bearer token for `register`, read from any layer. Never serialized.
    ///
    /// Environment variable: `ENLIST_TOKEN`
    #[serde(skip)]
    pub credential: Option<Credential>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            upstream: UpstreamConfig::default(),
            registration: RegistrationConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            timeout_ms: default_upstream_timeout_ms(),
            listing_max_pages: default_listing_max_pages(),
            registration_payload: default_registration_payload(),
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            eligible_categories: default_eligible_categories(),
            delay_ms: default_register_delay_ms(),
            gateway_url: default_gateway_url(),
            credential: None,
        }
    }
}

impl UpstreamConfig {
    /// Validate upstream settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("UPSTREAM_BASE_URL", &self.base_url)?;

        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidUpstreamTimeout {
                value: self.timeout_ms,
            });
        }

        if self.listing_max_pages == 0 || self.listing_max_pages > MAX_LISTING_PAGES {
            return Err(ConfigError::InvalidListingMaxPages {
                value: self.listing_max_pages,
            });
        }

        if !self.registration_payload.is_object() {
            return Err(ConfigError::InvalidRegistrationPayload {
                reason: "payload must be a JSON object".to_string(),
            });
        }

        Ok(())
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RegistrationConfig {
    /// Validate orchestrator settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eligible_categories.is_empty() {
            return Err(ConfigError::EmptyEligibleCategories);
        }

        validate_http_url("GATEWAY_URL", &self.gateway_url)
    }

    /// Inter-request delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation.
    ///
    /// Upstream base URLs other than the default may embed credentials, so they are masked.
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if let Ok(mut url) = Url::parse(&config.upstream.base_url)
            && (!url.username().is_empty() || url.password().is_some())
        {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            config.upstream.base_url = format!("{} [REDACTED USERINFO]", url);
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        self.upstream.validate()?;
        self.registration.validate()?;

        Ok(())
    }
}

fn validate_http_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: source.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(())
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_upstream_base_url() -> String {
    "https://platform.synack.com".to_string()
}

fn default_upstream_timeout_ms() -> u64 {
    30_000
}

fn default_listing_max_pages() -> u32 {
    500
}

fn default_registration_payload() -> serde_json::Value {
    serde_json::json!({ "ResearcherListing": { "terms": 1 } })
}

fn default_eligible_categories() -> Vec<String> {
    [
        "Web Application",
        "Host",
        "Mobile",
        "Hardware",
        "Reverse Engineering",
        "Source Code",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_register_delay_ms() -> u64 {
    150
}

fn default_gateway_url() -> String {
    "http://localhost:3000".to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("{field} '{value}' is not a valid http(s) URL: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("upstream timeout must be positive, got {value}")]
    InvalidUpstreamTimeout { value: u64 },
    #[error("listing max pages must be between 1 and {max}, got {value}", max = MAX_LISTING_PAGES)]
    InvalidListingMaxPages { value: u32 },
    #[error("registration payload is invalid: {reason}")]
    InvalidRegistrationPayload { reason: String },
    #[error("no eligible categories configured; set ENLIST_ELIGIBLE_CATEGORIES")]
    EmptyEligibleCategories,
    #[error("ENLIST_TOKEN cannot be sent as an Authorization header")]
    InvalidToken,
}

/// Loads configuration using layered `.env` files and `ENLIST_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("ENLIST_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);

        let upstream_base_url = layered
            .remove("UPSTREAM_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_upstream_base_url);
        let upstream_timeout_ms = layered
            .remove("UPSTREAM_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_upstream_timeout_ms);
        let listing_max_pages = layered
            .remove("LISTING_MAX_PAGES")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_listing_max_pages);
        let registration_payload = match layered
            .remove("REGISTRATION_PAYLOAD")
            .filter(|v| !v.trim().is_empty())
        {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                ConfigError::InvalidRegistrationPayload {
                    reason: e.to_string(),
                }
            })?,
            None => default_registration_payload(),
        };

        let eligible_categories = layered
            .remove("ELIGIBLE_CATEGORIES")
            .map(|categories| {
                categories
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(default_eligible_categories);
        let register_delay_ms = layered
            .remove("REGISTER_DELAY_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_register_delay_ms);
        let gateway_url = layered
            .remove("GATEWAY_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_gateway_url);

        let credential = match layered
            .remove("TOKEN")
            .filter(|v| !v.trim().is_empty())
        {
            Some(token) => Some(Credential::bearer(&token).ok_or(ConfigError::InvalidToken)?),
            None => None,
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            upstream: UpstreamConfig {
                base_url: upstream_base_url,
                timeout_ms: upstream_timeout_ms,
                listing_max_pages,
                registration_payload,
            },
            registration: RegistrationConfig {
                eligible_categories,
                delay_ms: register_delay_ms,
                gateway_url,
                credential,
            },
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("ENLIST_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("ENLIST_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
