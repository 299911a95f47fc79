use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stockgate")]
#[command(about = "Stockgate - price analytics ingestion and real-time fan-out gateway")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway with the given configuration
    Start {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config/stockgate.yaml", env = "STOCKGATE_CONFIG")]
        config: PathBuf,

        /// Override HTTP port
        #[arg(long)]
        http: Option<u16>,

        /// Override WebSocket port
        #[arg(long)]
        ws: Option<u16>,

        /// Override the configured log format
        #[arg(long, value_enum)]
        log_format: Option<LogFormatArg>,
    },

    /// Validate configuration without starting the gateway
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config/stockgate.yaml", env = "STOCKGATE_CONFIG")]
        config: PathBuf,
    },

    /// Write a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "config/stockgate.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
