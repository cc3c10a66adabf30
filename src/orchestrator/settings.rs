//! Per-run settings: configured registration values with command-line overrides applied.

use std::time::Duration;

use thiserror::Error;

use crate::auth::Credential;
use crate::config::RegistrationConfig;

/// Values supplied on the command line for one run. `None`/empty means "use the configuration".
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub token: Option<String>,
    pub gateway_url: Option<String>,
    pub categories: Vec<String>,
    pub delay_ms: Option<u64>,
}

/// Everything a registration run needs.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub credential: Credential,
    pub gateway_url: String,
    pub eligible: Vec<String>,
    pub delay: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("a token is required: pass --token or set ENLIST_TOKEN")]
    MissingToken,
    #[error("the token cannot be sent as an Authorization header")]
    InvalidToken,
}

impl RunSettings {
    /// Apply overrides on top of configuration. The `--token` flag beats `ENLIST_TOKEN`.
    pub fn resolve(
        config: RegistrationConfig,
        overrides: RunOverrides,
    ) -> Result<Self, SettingsError> {
        let configured_delay = config.delay();
        let credential = match overrides.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => {
                Credential::bearer(token).ok_or(SettingsError::InvalidToken)?
            }
            _ => config.credential.ok_or(SettingsError::MissingToken)?,
        };

        let categories: Vec<String> = overrides
            .categories
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        let eligible = if categories.is_empty() {
            config.eligible_categories
        } else {
            categories
        };

        let gateway_url = overrides
            .gateway_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(config.gateway_url);

        let delay = overrides
            .delay_ms
            .map(Duration::from_millis)
            .unwrap_or(configured_delay);

        Ok(Self {
            credential,
            gateway_url,
            eligible,
            delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> RegistrationConfig {
        RegistrationConfig {
            eligible_categories: vec!["Host".to_string()],
            delay_ms: 150,
            gateway_url: "http://gateway.internal:3000".to_string(),
            credential: Credential::bearer("from-env"),
        }
    }

    #[test]
    fn test_configuration_used_without_overrides() {
        let settings = RunSettings::resolve(configured(), RunOverrides::default()).unwrap();

        assert_eq!(settings.credential.as_bytes(), b"Bearer from-env");
        assert_eq!(settings.gateway_url, "http://gateway.internal:3000");
        assert_eq!(settings.eligible, vec!["Host".to_string()]);
        assert_eq!(settings.delay, Duration::from_millis(150));
    }

    #[test]
    fn test_flags_override_configuration() {
        let overrides = RunOverrides {
            token: Some("from-flag".to_string()),
            gateway_url: Some("http://127.0.0.1:4000/".to_string()),
            categories: vec!["Web Application".to_string(), " Mobile ".to_string()],
            delay_ms: Some(0),
        };

        let settings = RunSettings::resolve(configured(), overrides).unwrap();

        assert_eq!(settings.credential.as_bytes(), b"Bearer from-flag");
        assert_eq!(settings.gateway_url, "http://127.0.0.1:4000");
        assert_eq!(
            settings.eligible,
            vec!["Web Application".to_string(), "Mobile".to_string()]
        );
        assert_eq!(settings.delay, Duration::ZERO);
    }

    #[test]
    fn test_blank_category_flags_fall_back_to_configuration() {
        let overrides = RunOverrides {
            categories: vec!["  ".to_string()],
            ..RunOverrides::default()
        };
        let settings = RunSettings::resolve(configured(), overrides).unwrap();
        assert_eq!(settings.eligible, vec!["Host".to_string()]);
    }

    #[test]
    fn test_token_required() {
        let mut config = configured();
        config.credential = None;

        let err = RunSettings::resolve(config.clone(), RunOverrides::default()).unwrap_err();
        assert_eq!(err, SettingsError::MissingToken);

        let blank = RunOverrides {
            token: Some("   ".to_string()),
            ..RunOverrides::default()
        };
        assert_eq!(
            RunSettings::resolve(config.clone(), blank).unwrap_err(),
            SettingsError::MissingToken
        );

        let invalid = RunOverrides {
            token: Some("bad\ntoken".to_string()),
            ..RunOverrides::default()
        };
        assert_eq!(
            RunSettings::resolve(config, invalid).unwrap_err(),
            SettingsError::InvalidToken
        );
    }
}
