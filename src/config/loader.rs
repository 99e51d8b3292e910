//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GuardConfig, ConfigError> {
    let config: GuardConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::resolve_breaker_config;
    use axum::http::StatusCode;
    use std::time::Duration;

    #[test]
    fn test_parse_reports_validation_errors() {
        let err = parse_config("[upstream]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_parse_reports_syntax_errors() {
        let err = parse_config("[breaker\nwindow_size = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_out_of_range_breaker_values_still_load() {
        let config = parse_config(
            "[breaker]\n\
             window_size = 1099511627776\n\
             success_codes = [200, 70000]\n\
             cooldown_schedule_ms = [-5]\n",
        )
        .unwrap();

        let breaker = resolve_breaker_config(&config.breaker);
        assert_eq!(breaker.window_size(), 3);
        assert_eq!(breaker.classifier().success_codes(), vec![StatusCode::OK]);
        assert_eq!(breaker.cooldown_schedule(), &[Duration::from_secs(1)]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
