//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Siddi - forward analytics events to the consumers your rules allow
#[derive(Parser, Debug)]
#[command(
    name = "siddi",
    author,
    version,
    about = "Rule-based analytics event dispatcher",
    long_about = "Forwards identify/track calls to configured analytics consumers.\n\n\
                  Each consumer gets only the events its allow/deny rule admits, with \n\
                  denied parameters stripped. Users are identified lazily on the first \n\
                  event a live consumer receives."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SIDDI_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SIDDI_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "SIDDI_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch a single event
    Track(TrackArgs),

    /// Dispatch a JSON lines script of identify/track calls
    Replay(ReplayArgs),

    /// Validate configuration file without dispatching
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `track` command
#[derive(Parser, Debug, Clone)]
pub struct TrackArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "siddi.toml", env = "SIDDI_CONFIG")]
    pub config: PathBuf,

    /// Identify this user before tracking
    #[arg(short, long)]
    pub user: Option<String>,

    /// User properties as a JSON object
    #[arg(long, requires = "user")]
    pub user_props: Option<String>,

    /// Event name
    pub event: String,

    /// Event properties as a JSON object
    #[arg(short, long)]
    pub props: Option<String>,

    /// Print the dispatch report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `replay` command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "siddi.toml", env = "SIDDI_CONFIG")]
    pub config: PathBuf,

    /// Script file, `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "siddi.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "siddi.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

impl Cli {
    /// Default log level derived from `-v` / `-q`
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track() {
        let cli = Cli::try_parse_from([
            "siddi",
            "-v",
            "track",
            "--config",
            "conf.toml",
            "--user",
            "u1",
            "document.create",
            "--props",
            r#"{"value1": 3}"#,
        ])
        .unwrap();

        assert_eq!(cli.log_level(), "debug");
        match cli.command {
            Commands::Track(args) => {
                assert_eq!(args.event, "document.create");
                assert_eq!(args.user.as_deref(), Some("u1"));
                assert_eq!(args.config, PathBuf::from("conf.toml"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_user_props_require_user() {
        let result = Cli::try_parse_from(["siddi", "track", "--user-props", "{}", "app.login"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["siddi", "-q", "-v", "info"]).is_err());
        let cli = Cli::try_parse_from(["siddi", "-q", "info"]).unwrap();
        assert_eq!(cli.log_level(), "warn");
    }
}
