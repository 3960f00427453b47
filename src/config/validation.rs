//! Configuration validation utilities and rules
//!
//! Hard limits live in [`Config::validate`]; this module adds advisory
//! warnings that never stop a run.

use crate::{error::Result, models::Config};
use std::net::IpAddr;

/// Configuration validator with advisory rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate hard limits, then collect advisory warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_target(config));
        warnings.extend(Self::validate_load_settings(config));
        Ok(warnings)
    }

    fn validate_target(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let host = config.target_host.trim_start_matches('[').trim_end_matches(']');

        match host.parse::<IpAddr>() {
            Ok(ip) if ip.is_loopback() => {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Target {} is loopback; results reflect this host only", host),
                ));
            }
            Ok(IpAddr::V4(ipv4)) if ipv4.is_unspecified() => {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Target {} is the unspecified address", host),
                ));
            }
            Ok(IpAddr::V4(ipv4)) if ipv4.is_private() => {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Target {} is on a private network", host),
                ));
            }
            Ok(_) => {}
            Err(_) if host.eq_ignore_ascii_case("localhost") => {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    "Target localhost is loopback; results reflect this host only".to_string(),
                ));
            }
            Err(_) => {}
        }

        warnings
    }

    fn validate_load_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.streams > crate::defaults::HIGH_STREAM_WARNING {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "{} concurrent streams may exhaust sockets or CPU before the link saturates",
                    config.streams
                ),
            ));
        } else if config.streams == 1 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "A single stream rarely saturates high-bandwidth links".to_string(),
            ));
        }

        if config.duration_seconds > crate::defaults::LONG_DURATION_WARNING_SECS {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Each phase runs {}s; the full test takes over {} minutes",
                    config.duration_seconds,
                    config.duration_seconds * 2 / 60
                ),
            ));
        } else if config.duration_seconds < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Phases of {}s may end before TCP ramp-up completes",
                    config.duration_seconds
                ),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        if !use_color {
            return format!("[{}] {}", self.level.as_str(), self.message);
        }

        use colored::Colorize;
        let tag = format!("[{}]", self.level.as_str());
        let tag = match self.level {
            ValidationLevel::Info => tag.blue(),
            ValidationLevel::Warning => tag.yellow(),
            ValidationLevel::Error => tag.red(),
        };
        format!("{} {}", tag, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warnings_for(config: &Config) -> Vec<ValidationWarning> {
        validate_config(config).unwrap()
    }

    #[test]
    fn test_default_config_only_notes_loopback() {
        let warnings = warnings_for(&Config::default());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, ValidationLevel::Info);
        assert!(warnings[0].message.contains("loopback"));
    }

    #[test]
    fn test_high_stream_count_warns() {
        let config = Config {
            target_host: "203.0.113.5".to_string(),
            streams: crate::defaults::HIGH_STREAM_WARNING + 1,
            ..Default::default()
        };
        let warnings = warnings_for(&config);
        assert!(warnings
            .iter()
            .any(|w| w.level == ValidationLevel::Warning && w.message.contains("streams")));
    }

    #[test]
    fn test_long_duration_warns() {
        let config = Config {
            target_host: "203.0.113.5".to_string(),
            duration_seconds: crate::defaults::LONG_DURATION_WARNING_SECS + 1,
            ..Default::default()
        };
        assert!(warnings_for(&config)
            .iter()
            .any(|w| w.level == ValidationLevel::Warning && w.message.contains("phase runs")));
    }

    #[test]
    fn test_private_and_public_targets() {
        let private = Config {
            target_host: "192.168.1.20".to_string(),
            ..Default::default()
        };
        assert!(warnings_for(&private).iter().any(|w| w.message.contains("private")));

        let public = Config {
            target_host: "speed.example.net".to_string(),
            ..Default::default()
        };
        assert!(warnings_for(&public).is_empty());
    }

    #[test]
    fn test_invalid_config_is_error() {
        let config = Config {
            streams: 0,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "check this".to_string());
        assert_eq!(warning.format(false), "[WARNING] check this");
        assert!(warning.format(true).contains("check this"));
    }
}
