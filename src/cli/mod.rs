//! Command-line interface module

pub mod interactive;

pub use interactive::InteractivePrompt;

use clap::{Args, Parser, Subcommand};

/// Network Speed Tester - multi-stream throughput with idle and loaded latency
#[derive(Parser, Debug, Clone)]
#[command(name = "nst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Force colored output
    #[arg(long, global = true)]
    pub color: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a test from this machine against a data server
    Run(RunArgs),
    /// Start a test on a remote agent and show its results here
    Remote(RemoteArgs),
    /// Serve the bulk-data endpoints and the control agent
    Serve(ServeArgs),
}

/// Target and load parameters shared by `run` and `remote`
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Target server host
    #[arg(long)]
    pub host: Option<String>,

    /// Target server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Number of concurrent streams
    #[arg(short = 'c', long = "streams")]
    pub streams: Option<u32>,

    /// Duration of each phase in seconds
    #[arg(short = 'd', long = "duration", value_parser = parse_duration)]
    pub duration: Option<u64>,

    /// Prompt for the configuration before starting
    #[arg(short = 'i', long)]
    pub interactive: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Agent to run the test on (host:port)
    #[arg(long)]
    pub agent: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on (SERVER_PORT takes precedence)
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind to
    #[arg(long, default_value = crate::defaults::DEFAULT_BIND_ADDR)]
    pub bind: String,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let Command::Remote(args) = &self.command {
            if args.agent.trim().is_empty() {
                return Err("--agent requires a host:port value".to_string());
            }
        }

        Ok(())
    }

    /// Target flags of the selected subcommand, if it has any
    pub fn target_args(&self) -> Option<&TargetArgs> {
        match &self.command {
            Command::Run(args) => Some(&args.target),
            Command::Remote(args) => Some(&args.target),
            Command::Serve(_) => None,
        }
    }

    /// Whether the selected subcommand asked for prompts
    pub fn is_interactive(&self) -> bool {
        self.target_args().is_some_and(|t| t.interactive)
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a phase duration in whole seconds
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > crate::defaults::MAX_DURATION_SECS {
                Err(format!(
                    "Duration cannot exceed {} seconds",
                    crate::defaults::MAX_DURATION_SECS
                ))
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    cfg!(unix)
}
