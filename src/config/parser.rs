//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::{Cli, Command, InteractivePrompt},
    config::{
        env::EnvManager,
        validation::{ConfigValidator, ValidationLevel, ValidationWarning},
    },
    error::Result,
    models::Config,
};
use std::path::PathBuf;

/// Configuration parser that layers defaults, .env, environment, CLI flags
/// and interactive prompts, in that order
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
}

impl ConfigParser {
    /// Create a new configuration parser reading `.env` from the working directory
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(".env"),
        }
    }

    /// Read the env file from `path` instead of `./.env`
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        self.parse_with_warnings().map(|(config, _)| config)
    }

    /// Parse the configuration and collect advisory warnings on the way
    pub fn parse_with_warnings(&self) -> Result<(Config, Vec<ValidationWarning>)> {
        let mut config = Config::default();
        let mut warnings = Vec::new();

        EnvManager::load_env_file_from(&self.env_file, self.cli.debug)?;
        config.merge_from_env()?;

        let env_server_port = match env_server_port() {
            Ok(port) => port,
            Err(warning) => {
                warnings.push(warning);
                None
            }
        };
        if let Some(port) = env_server_port {
            config.server_port = port;
        }

        self.apply_cli_overrides(&mut config, env_server_port.is_some());

        if self.cli.is_interactive() {
            InteractivePrompt::new(config.enable_color).prompt_config(&mut config)?;
        }

        warnings.extend(ConfigValidator::validate_comprehensive(&config)?);
        Ok((config, warnings))
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config, server_port_from_env: bool) {
        if let Some(target) = self.cli.target_args() {
            if let Some(ref host) = target.host {
                config.target_host = host.clone();
            }
            if let Some(port) = target.port {
                config.target_port = port;
            }
            if let Some(streams) = target.streams {
                config.streams = streams;
            }
            if let Some(duration) = target.duration {
                config.duration_seconds = duration;
            }
        }

        // SERVER_PORT wins over --port
        if let Command::Serve(ref serve) = self.cli.command {
            match serve.port {
                Some(port) if !server_port_from_env => config.server_port = port,
                _ => {}
            }
        }

        config.enable_color = if self.cli.color {
            true
        } else {
            config.enable_color && self.cli.use_colors()
        };

        // CLI-only flags
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            println!("Applied CLI overrides to configuration");
            println!("{}", display_config_summary(config));
        }
    }
}

/// `SERVER_PORT` from the environment; an unusable value becomes a warning
fn env_server_port() -> std::result::Result<Option<u16>, ValidationWarning> {
    let Ok(raw) = std::env::var("SERVER_PORT") else {
        return Ok(None);
    };

    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(Some(port)),
        _ => Err(ValidationWarning::new(
            ValidationLevel::Warning,
            format!(
                "Invalid SERVER_PORT value '{}', falling back to default port {}",
                raw,
                crate::defaults::DEFAULT_SERVER_PORT
            ),
        )),
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Target: {}:{}", config.target_host, config.target_port));
    summary.push(format!("Streams: {}", config.streams));
    summary.push(format!("Phase Duration: {}s", config.duration_seconds));
    summary.push(format!("Server Port: {}", config.server_port));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::{env, sync::Mutex};
    use tempfile::TempDir;

    // Environment variables are process-wide
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "TARGET_HOST",
        "TARGET_PORT",
        "STREAMS",
        "DURATION_SECONDS",
        "SERVER_PORT",
        "ENABLE_COLOR",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn parser(args: &[&str], dir: &TempDir) -> ConfigParser {
        ConfigParser::new(Cli::parse_from(args)).with_env_file(dir.path().join(".env"))
    }

    #[test]
    fn test_defaults_without_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        let dir = TempDir::new().unwrap();

        let config = parser(&["nst", "run"], &dir).parse().unwrap();
        assert_eq!(config.target_host, crate::defaults::DEFAULT_TARGET_HOST);
        assert_eq!(config.target_port, crate::defaults::DEFAULT_TARGET_PORT);
        assert_eq!(config.streams, crate::defaults::DEFAULT_STREAMS);
        assert_eq!(config.duration_seconds, crate::defaults::DEFAULT_DURATION.as_secs());
        assert!(!config.verbose);
    }

    #[test]
    fn test_cli_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        let dir = TempDir::new().unwrap();

        let args = ["nst", "run", "--host", "10.0.0.2", "--port", "9000", "-c", "4", "-d", "3", "--no-color", "--verbose"];
        let config = parser(&args, &dir).parse().unwrap();

        assert_eq!(config.target_host, "10.0.0.2");
        assert_eq!(config.target_port, 9000);
        assert_eq!(config.streams, 4);
        assert_eq!(config.duration_seconds, 3);
        assert!(!config.enable_color);
        assert!(config.verbose);
    }

    #[test]
    fn test_cli_overrides_env_vars() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        let dir = TempDir::new().unwrap();

        env::set_var("STREAMS", "8");
        env::set_var("TARGET_HOST", "10.9.9.9");
        let config = parser(&["nst", "run", "--streams", "12"], &dir).parse().unwrap();
        clear_env();

        assert_eq!(config.streams, 12);
        assert_eq!(config.target_host, "10.9.9.9");
    }

    #[test]
    fn test_env_file_is_loaded() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "STREAMS=6\nDURATION_SECONDS=4\n").unwrap();

        let config = parser(&["nst", "run"], &dir).parse().unwrap();
        clear_env();

        assert_eq!(config.streams, 6);
        assert_eq!(config.duration_seconds, 4);
    }

    #[test]
    fn test_invalid_env_value_is_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        let dir = TempDir::new().unwrap();

        env::set_var("STREAMS", "lots");
        let result = parser(&["nst", "run"], &dir).parse();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_server_port_env_beats_flag() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        let dir = TempDir::new().unwrap();

        env::set_var("SERVER_PORT", "9100");
        let config = parser(&["nst", "serve", "--port", "9200"], &dir).parse().unwrap();
        clear_env();
        assert_eq!(config.server_port, 9100);

        let config = parser(&["nst", "serve", "--port", "9200"], &dir).parse().unwrap();
        assert_eq!(config.server_port, 9200);
    }

    #[test]
    fn test_invalid_server_port_warns_and_keeps_default() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        let dir = TempDir::new().unwrap();

        env::set_var("SERVER_PORT", "not-a-port");
        let (config, warnings) = parser(&["nst", "serve", "--port", "9200"], &dir)
            .parse_with_warnings()
            .unwrap();
        clear_env();

        assert_eq!(config.server_port, 9200);
        assert!(warnings.iter().any(|w| w.message.contains("SERVER_PORT")));
    }

    #[test]
    fn test_config_summary() {
        let summary = display_config_summary(&Config::default());
        assert!(summary.contains("Target: 127.0.0.1:8080"));
        assert!(summary.contains("Streams: 16"));
        assert!(summary.contains("Phase Duration: 10s"));
    }
}
