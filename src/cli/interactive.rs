//! Interactive configuration prompts
//!
//! Asks for target host, port, stream count and phase duration before a run.
//! Uses dialoguer when the feature is enabled and falls back to plain stdio
//! otherwise. Empty or unparsable input keeps the value already configured.

use crate::{models::Config, AppError, Result};
use std::{
    fmt::Display,
    io::{self, BufRead, Write},
    str::FromStr,
};

/// Prompts for the fields of a test configuration
pub struct InteractivePrompt {
    /// Whether to use colored prompts
    use_colors: bool,
    /// Whether to use enhanced interactive features (dialoguer)
    use_enhanced: bool,
}

impl InteractivePrompt {
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            use_enhanced: cfg!(feature = "dialoguer"),
        }
    }

    /// Prompt for every target field, editing `config` in place
    pub fn prompt_config(&self, config: &mut Config) -> Result<()> {
        if self.use_enhanced {
            self.prompt_enhanced(config)
        } else {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            self.prompt_basic(config, &mut input)
        }
    }

    #[cfg(feature = "dialoguer")]
    fn prompt_enhanced(&self, config: &mut Config) -> Result<()> {
        use dialoguer::Input;

        let ask = |label: &str, current: String| -> Result<String> {
            Input::<String>::new()
                .with_prompt(label)
                .default(current)
                .allow_empty(true)
                .interact_text()
                .map_err(|e| AppError::io(format!("Input failed: {}", e)))
        };

        let host = ask("Target host", config.target_host.clone())?;
        config.target_host = apply_input(config.target_host.clone(), &host);

        let port = ask("Target port", config.target_port.to_string())?;
        config.target_port = apply_input(config.target_port, &port);

        let streams = ask("Concurrent streams", config.streams.to_string())?;
        config.streams = apply_input(config.streams, &streams);

        let duration = ask("Phase duration (seconds)", config.duration_seconds.to_string())?;
        config.duration_seconds = apply_input(config.duration_seconds, &duration);

        Ok(())
    }

    #[cfg(not(feature = "dialoguer"))]
    fn prompt_enhanced(&self, config: &mut Config) -> Result<()> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        self.prompt_basic(config, &mut input)
    }

    /// Prompt on stdout and read answers line by line from `input`
    pub(crate) fn prompt_basic<R: BufRead>(&self, config: &mut Config, input: &mut R) -> Result<()> {
        let host = self.ask_line(input, "Target host", &config.target_host)?;
        config.target_host = apply_input(config.target_host.clone(), &host);

        let port = self.ask_line(input, "Target port", &config.target_port)?;
        config.target_port = apply_input(config.target_port, &port);

        let streams = self.ask_line(input, "Concurrent streams", &config.streams)?;
        config.streams = apply_input(config.streams, &streams);

        let duration = self.ask_line(input, "Phase duration (seconds)", &config.duration_seconds)?;
        config.duration_seconds = apply_input(config.duration_seconds, &duration);

        Ok(())
    }

    fn ask_line<R: BufRead>(&self, input: &mut R, label: &str, current: &dyn Display) -> Result<String> {
        if self.use_colors {
            use colored::Colorize;
            print!("{} [{}]: ", label.bold(), current.to_string().cyan());
        } else {
            print!("{} [{}]: ", label, current);
        }
        io::stdout()
            .flush()
            .map_err(|e| AppError::io(format!("Failed to flush stdout: {}", e)))?;

        let mut line = String::new();
        input
            .read_line(&mut line)
            .map_err(|e| AppError::io(format!("Failed to read input: {}", e)))?;
        Ok(line)
    }
}

impl Default for InteractivePrompt {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Parse `raw` into `T`, keeping `current` when it is blank or invalid
fn apply_input<T: FromStr>(current: T, raw: &str) -> T {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return current;
    }
    trimmed.parse().unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_apply_input() {
        assert_eq!(apply_input(16u32, ""), 16);
        assert_eq!(apply_input(16u32, "   \n"), 16);
        assert_eq!(apply_input(16u32, "8\n"), 8);
        assert_eq!(apply_input(16u32, "many"), 16);
        assert_eq!(apply_input(8080u16, "70000"), 8080);
        assert_eq!(apply_input("127.0.0.1".to_string(), " 10.1.1.1 \n"), "10.1.1.1");
    }

    #[test]
    fn test_prompt_basic_mixed_answers() {
        let prompt = InteractivePrompt::new(false);
        let mut config = Config::default();
        let mut input = Cursor::new("10.0.0.7\n\nabc\n5\n");

        prompt.prompt_basic(&mut config, &mut input).unwrap();

        assert_eq!(config.target_host, "10.0.0.7");
        assert_eq!(config.target_port, crate::defaults::DEFAULT_TARGET_PORT);
        assert_eq!(config.streams, crate::defaults::DEFAULT_STREAMS);
        assert_eq!(config.duration_seconds, 5);
    }

    #[test]
    fn test_prompt_basic_eof_keeps_everything() {
        let prompt = InteractivePrompt::new(false);
        let mut config = Config::default();
        let before = config.clone();
        let mut input = Cursor::new("");

        prompt.prompt_basic(&mut config, &mut input).unwrap();

        assert_eq!(config.target_host, before.target_host);
        assert_eq!(config.target_port, before.target_port);
        assert_eq!(config.streams, before.streams);
        assert_eq!(config.duration_seconds, before.duration_seconds);
    }

    #[test]
    fn test_enhanced_feature_detection() {
        let prompt = InteractivePrompt::default();
        assert_eq!(prompt.use_enhanced, cfg!(feature = "dialoguer"));
    }
}
