//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate), and their associated argument structs.
//! Every `run` flag has an environment variable equivalent for container
//! deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("HASHLB_GIT_SHORT"),
    ", ",
    env!("HASHLB_BUILD_PROFILE"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "hashlb",
    version,
    long_version = LONG_VERSION,
    about = "Path-hashing HTTP load balancer",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        hashlb run                                  Start with ./hashlb.yaml or defaults\n  \
        hashlb run -b 10.0.0.1:8080 -b 10.0.0.2:8080  Explicit backends\n  \
        hashlb validate hashlb.yaml                 Check a config file"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the load balancer
    Run(Box<RunArgs>),

    /// Validate a config file without starting
    Validate(ValidateArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        hashlb run                                   Auto-detect config\n  \
        hashlb run -c hashlb.yaml -p 8090 --pretty   Local dev mode\n  \
        hashlb run --trace --timeout-sec 5           Trace header, longer timeout\n  \
        BACKENDS=a:8080,b:8080 hashlb run            Backends from the environment")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listen port [default: 8090]
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Backends --
    /// Backend address (host:port); repeat for each backend
    #[arg(
        short,
        long = "backend",
        env = "BACKENDS",
        value_delimiter = ',',
        help_heading = "Backends"
    )]
    pub backends: Vec<String>,

    /// Reach backends over HTTPS
    #[arg(long, env = "HASHLB_HTTPS", help_heading = "Backends")]
    pub https: bool,

    /// Add an `lb-from` header naming the serving backend to responses
    #[arg(long, env = "HASHLB_TRACE", help_heading = "Backends")]
    pub trace: bool,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Request and health check timeout in seconds [default: 3]
    #[arg(long, env = "TIMEOUT_SEC", help_heading = "Tuning")]
    pub timeout_sec: Option<u64>,

    /// Seconds between health probes of each backend [default: 10]
    #[arg(long, env = "HEALTH_INTERVAL_SECS", help_heading = "Tuning")]
    pub health_interval_secs: Option<u64>,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "hashlb.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
