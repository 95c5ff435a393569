// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes, path prefixes, and non-zero polling intervals.

use crate::diagnostic::ConfigError;
use crate::model::MolarisseConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MolarisseConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let base_url = config.api.base_url.trim();
    if base_url.is_empty() {
        errors.push(ConfigError::Validation {
            message: "api.base_url must not be empty".to_string(),
        });
    } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::Validation {
            message: format!("api.base_url `{base_url}` must start with http:// or https://"),
        });
    }

    if !config.api.api_prefix.starts_with('/') {
        errors.push(ConfigError::Validation {
            message: format!(
                "api.api_prefix `{}` must start with `/`",
                config.api.api_prefix
            ),
        });
    }

    if config.api.auth_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
        errors.push(ConfigError::Validation {
            message: "api.auth_token must not be blank when set".to_string(),
        });
    }

    if config.api.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "api.request_timeout_secs must be at least 1".to_string(),
        });
    }

    for (key, value) in [
        ("sync.thread_refresh_secs", config.sync.thread_refresh_secs),
        (
            "sync.conversation_refresh_secs",
            config.sync.conversation_refresh_secs,
        ),
        ("sync.unread_refresh_secs", config.sync.unread_refresh_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be at least 1, got 0"),
            });
        }
    }

    if config.sync.event_buffer == 0 {
        errors.push(ConfigError::Validation {
            message: "sync.event_buffer must be at least 1".to_string(),
        });
    }

    if config.media.profile_bucket.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "media.profile_bucket must not be empty".to_string(),
        });
    }

    if config.media.default_avatar.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "media.default_avatar must not be empty".to_string(),
        });
    }

    let level = config.log.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_validation_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = MolarisseConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn base_url_without_scheme_fails_validation() {
        let mut config = MolarisseConfig::default();
        config.api.base_url = "clinic.local:8080".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_validation_error(&errors, "api.base_url"));
    }

    #[test]
    fn zero_intervals_are_all_reported() {
        let mut config = MolarisseConfig::default();
        config.sync.thread_refresh_secs = 0;
        config.sync.conversation_refresh_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(has_validation_error(&errors, "sync.thread_refresh_secs"));
        assert!(has_validation_error(&errors, "sync.conversation_refresh_secs"));
    }

    #[test]
    fn prefix_must_be_absolute() {
        let mut config = MolarisseConfig::default();
        config.api.api_prefix = "api/v1".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_validation_error(&errors, "api.api_prefix"));
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = MolarisseConfig::default();
        config.log.level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_validation_error(&errors, "log.level"));
    }

    #[test]
    fn blank_token_fails_but_missing_token_passes() {
        let mut config = MolarisseConfig::default();
        config.api.auth_token = Some("   ".to_string());
        assert!(has_validation_error(
            &validate_config(&config).unwrap_err(),
            "api.auth_token"
        ));
        config.api.auth_token = None;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn sections_deny_unknown_fields() {
        let toml_str = r#"
[sync]
thread_refresh_secs = 10
poll_jitter = 3
"#;
        assert!(toml::from_str::<MolarisseConfig>(toml_str).is_err());
    }
}
