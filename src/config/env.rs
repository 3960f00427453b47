//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env from the current directory if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists. Variables already set in the
    /// process environment are never overwritten.
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                println!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            println!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Network Speed Tester Configuration
#
# Values set here are used as defaults and can be overridden by
# environment variables and command-line arguments.

# Host running the data server (run/remote)
# TARGET_HOST=127.0.0.1

# Port of the data server (run/remote)
# TARGET_PORT=8080

# Concurrent transfer streams per phase (1-256)
# STREAMS=16

# Duration of each load phase in seconds (1-3600)
# DURATION_SECONDS=10

# Port the serve command listens on (overrides --port)
# SERVER_PORT=8080

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Example: saturate a 10G link for longer
# STREAMS=32
# DURATION_SECONDS=30
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "TARGET_HOST" => {
                if value.is_empty() {
                    return Err(AppError::config("TARGET_HOST cannot be empty"));
                }
            }
            "TARGET_PORT" | "SERVER_PORT" => {
                let port: u16 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if port == 0 {
                    return Err(AppError::config(format!("{} must be between 1 and 65535", key)));
                }
            }
            "STREAMS" => {
                let streams: u32 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid STREAMS value '{}': {}", value, e)))?;
                if streams == 0 || streams > crate::defaults::MAX_STREAMS {
                    return Err(AppError::config(format!(
                        "STREAMS must be between 1 and {}, got: {}",
                        crate::defaults::MAX_STREAMS,
                        streams
                    )));
                }
            }
            "DURATION_SECONDS" => {
                let secs: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid DURATION_SECONDS value '{}': {}", value, e)))?;
                if secs == 0 || secs > crate::defaults::MAX_DURATION_SECS {
                    return Err(AppError::config(format!(
                        "DURATION_SECONDS must be between 1 and {}, got: {}",
                        crate::defaults::MAX_DURATION_SECS,
                        secs
                    )));
                }
            }
            "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("TARGET_HOST", "Host running the data server", "192.168.1.10"),
            ("TARGET_PORT", "Port of the data server", "8080"),
            ("STREAMS", "Concurrent streams per phase (1-256)", "16"),
            ("DURATION_SECONDS", "Load phase duration in seconds (1-3600)", "10"),
            ("SERVER_PORT", "Listen port for serve (overrides --port)", "8080"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<18} {}\n", var, description));
            help.push_str(&format!("  {:<18} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Interactive prompts\n");
        help.push_str("  2. Command-line arguments (SERVER_PORT beats --port)\n");
        help.push_str("  3. Environment variables\n");
        help.push_str("  4. .env file values\n");
        help.push_str("  5. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value).err().map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Validate the entries of an env file without loading it
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let warnings = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                Self::validate_env_var(key.trim(), value)
                    .err()
                    .map(|e| format!("Line '{}': {}", line, e))
            })
            .collect();

        Ok(Some(warnings))
    }
}
