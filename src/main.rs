//! kvprobe CLI.
//!
//! ```text
//! kvprobe 127.0.0.1 2000                 # run the canonical suite
//! kvprobe 127.0.0.1 2000 --prefix ci     # reproducible namespace
//! kvprobe 127.0.0.1 2000 GET ci_a        # single-shot: print the raw reply
//! kvprobe echo 127.0.0.1 8888 "hi" --count 5
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::warn;

use kvprobe::codec::DecodeStrategy;
use kvprobe::commands::{self, echo::EchoConfig};
use kvprobe::config::{FileConfig, Overrides, RunConfig};
use kvprobe::constants;
use kvprobe::suite::Suite;
use kvprobe::transport::Endpoint;
use kvprobe::ui;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "kvprobe",
    version,
    about = "Conformance harness for line-oriented key-value servers",
    subcommand_precedence_over_arg = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    probe: ProbeArgs,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that an echo server sends messages back unchanged
    Echo(EchoArgs),
}

/// Run the assertion suite, or send one command if COMMAND is given.
#[derive(Args)]
struct ProbeArgs {
    /// Server host
    host: Option<String>,

    /// Server port
    port: Option<u16>,

    /// Command to send once (e.g. SET k v). Omit to run the assertion suite.
    /// Everything from the first COMMAND token on, flags included, is sent
    /// as part of the command; put options before it.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,

    /// Run the assertion suite (the default when no COMMAND is given)
    #[arg(long)]
    batch: bool,

    /// Key namespace prefix (default: ns<unix-seconds>)
    #[arg(long)]
    prefix: Option<String>,

    /// Built-in case sequence
    #[arg(long, value_enum)]
    suite: Option<Suite>,

    /// TOML file with [[case]] entries
    #[arg(long)]
    cases: Option<PathBuf>,

    /// Connect timeout in milliseconds [default: 3000]
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Per-reply read timeout in milliseconds [default: 2000]
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Pause after each passing case in milliseconds [default: 50]
    #[arg(long)]
    pace_ms: Option<u64>,

    /// How to decode reply bytes that are not valid UTF-8 [default: replace]
    #[arg(long, value_enum)]
    decode: Option<DecodeStrategy>,

    /// Config file (default: ./kvprobe.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ProbeArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            host: self.host,
            port: self.port,
            command: self.command,
            prefix: self.prefix,
            suite: self.suite,
            cases: self.cases,
            connect_timeout_ms: self.connect_timeout_ms,
            read_timeout_ms: self.read_timeout_ms,
            pace_ms: self.pace_ms,
            decode: self.decode,
        }
    }
}

#[derive(Args)]
struct EchoArgs {
    /// Server host
    host: String,

    /// Server port
    port: u16,

    /// Message to send
    #[arg(default_value = constants::ECHO_DEFAULT_MESSAGE)]
    message: String,

    /// Number of attempts, each on a fresh connection
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Pause between attempts in milliseconds
    #[arg(long, default_value_t = constants::ECHO_INTERVAL_MS)]
    interval_ms: u64,

    /// Connect and read timeout in milliseconds
    #[arg(long, default_value_t = constants::ECHO_TIMEOUT_MS)]
    timeout_ms: u64,
}

impl From<EchoArgs> for EchoConfig {
    fn from(args: EchoArgs) -> Self {
        Self {
            endpoint: Endpoint::new(args.host, args.port),
            message: args.message,
            count: args.count,
            interval: Duration::from_millis(args.interval_ms),
            timeout: Duration::from_millis(args.timeout_ms),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Echo(args)) = cli.command {
        if cli.probe.host.is_some() {
            bail!(
                "HOST/PORT given before `echo`\n  \
                 The echo probe takes its own target: kvprobe echo HOST PORT"
            );
        }
        return commands::echo::execute(&args.into());
    }

    if cli.probe.batch && !cli.probe.command.is_empty() {
        warn!("--batch ignored: a COMMAND was given, sending it once instead");
    }

    let file = match &cli.probe.config {
        Some(path) => Some(FileConfig::load_from(path)?),
        None => FileConfig::load_default()?,
    };

    let config = RunConfig::resolve(cli.probe.into_overrides(), file, Utc::now())?;
    let validation = config.validate()?;
    if validation.has_warnings() {
        for warning in &validation.warnings {
            warn!("{warning}");
            eprintln!("Warning: {warning}");
        }
    }

    commands::execute(&config)
}

/// Print an error the way its kind deserves.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<kvprobe::Error>() {
        // The transcript already ends with EXPECTED/FAIL
        Some(kvprobe::Error::ProtocolMismatch { .. }) => {},
        Some(e) if !e.hints().is_empty() => ui::report_error(e),
        _ => eprintln!("Error: {err:#}"),
    }
}

/// Initialize stderr logging so stdout carries only the transcript.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_echo_after_global_flag() {
        let cli = Cli::try_parse_from(["kvprobe", "-v", "echo", "127.0.0.1", "8888", "hi"]).unwrap();

        assert_eq!(cli.verbose, 1);
        assert!(cli.probe.host.is_none());
        match cli.command {
            Some(Commands::Echo(args)) => {
                assert_eq!(args.host, "127.0.0.1");
                assert_eq!(args.port, 8888);
                assert_eq!(args.message, "hi");
            },
            None => panic!("echo not parsed as a subcommand"),
        }
    }

    #[test]
    fn test_echo_with_trailing_flag() {
        let cli = Cli::try_parse_from(["kvprobe", "echo", "127.0.0.1", "8888", "-vv"]).unwrap();

        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Some(Commands::Echo(_))));
    }

    #[test]
    fn test_positional_single_shot() {
        let cli =
            Cli::try_parse_from(["kvprobe", "--prefix", "ci", "127.0.0.1", "2000", "GET", "k"])
                .unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.probe.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.probe.port, Some(2000));
        assert_eq!(cli.probe.command, ["GET", "k"]);
        assert_eq!(cli.probe.prefix.as_deref(), Some("ci"));
    }

    #[test]
    fn test_flags_after_command_are_sent() {
        let cli = Cli::try_parse_from(["kvprobe", "h", "1", "GET", "k", "--read-timeout-ms", "100"])
            .unwrap();

        assert_eq!(cli.probe.command, ["GET", "k", "--read-timeout-ms", "100"]);
        assert!(cli.probe.read_timeout_ms.is_none());
    }
}
