//! Run configuration.
//!
//! The core consumes a single [`RunConfig`]. It is assembled from CLI flags
//! ([`Overrides`]) layered over an optional `kvprobe.toml` ([`FileConfig`]),
//! falling back to the built-in defaults in [`crate::constants`]:
//!
//! ```toml
//! [target]
//! host = "127.0.0.1"
//! port = 2000
//!
//! [timeouts]
//! connect_ms = 3000
//! read_ms = 2000
//!
//! [run]
//! pace_ms = 50
//! prefix = "ci"
//! decode = "replace"
//! suite = "canonical"
//! ```
//!
//! The namespace is resolved here, once, so the rest of the run never looks
//! at the clock.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::DecodeStrategy;
use crate::constants;
use crate::namespace::Namespace;
use crate::runner::RunOptions;
use crate::suite::Suite;
use crate::transport::{Endpoint, SessionOptions};
use crate::utils;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// kvprobe.toml structure. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub target: TargetSection,
    #[serde(default)]
    pub timeouts: TimeoutSection,
    #[serde(default)]
    pub run: RunSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutSection {
    pub connect_ms: Option<u64>,
    pub read_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub pace_ms: Option<u64>,
    pub prefix: Option<String>,
    pub decode: Option<DecodeStrategy>,
    pub suite: Option<Suite>,
    pub cases: Option<PathBuf>,
}

impl FileConfig {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `kvprobe.toml` from the current directory if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let path = Path::new(constants::CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(path).map(Some)
    }
}

/// Values taken from the command line. `None`/empty means "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub command: Vec<String>,
    pub prefix: Option<String>,
    pub suite: Option<Suite>,
    pub cases: Option<PathBuf>,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub pace_ms: Option<u64>,
    pub decode: Option<DecodeStrategy>,
}

/// Where assertion cases come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseSource {
    Builtin(Suite),
    File(PathBuf),
}

/// What the run does once connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Send one command and print the raw reply.
    SingleShot(String),
    /// Drive the assertion runner.
    Assert(CaseSource),
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub endpoint: Endpoint,
    pub session: SessionOptions,
    pub run: RunOptions,
    pub namespace: Namespace,
    pub mode: Mode,
}

impl RunConfig {
    /// Merge CLI overrides over the file config and defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if no host or port was supplied anywhere.
    pub fn resolve(cli: Overrides, file: Option<FileConfig>, now: DateTime<Utc>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let host = cli.host.or(file.target.host).context(
            "No server host given\n  \
             Pass HOST PORT on the command line or set [target].host in kvprobe.toml",
        )?;
        let port = cli.port.or(file.target.port).context(
            "No server port given\n  \
             Pass HOST PORT on the command line or set [target].port in kvprobe.toml",
        )?;

        let connect_ms = cli
            .connect_timeout_ms
            .or(file.timeouts.connect_ms)
            .unwrap_or(constants::DEFAULT_CONNECT_TIMEOUT_MS);
        let read_ms = cli
            .read_timeout_ms
            .or(file.timeouts.read_ms)
            .unwrap_or(constants::DEFAULT_READ_TIMEOUT_MS);
        let pace_ms = cli
            .pace_ms
            .or(file.run.pace_ms)
            .unwrap_or(constants::DEFAULT_PACE_MS);
        let decode = cli.decode.or(file.run.decode).unwrap_or_default();

        let prefix = cli.prefix.or(file.run.prefix);
        let namespace = Namespace::allocate(prefix.as_deref(), now);

        let mode = if cli.command.is_empty() {
            match cli.cases.or(file.run.cases) {
                Some(path) if cli.suite.is_none() => Mode::Assert(CaseSource::File(path)),
                _ => Mode::Assert(CaseSource::Builtin(
                    cli.suite.or(file.run.suite).unwrap_or_default(),
                )),
            }
        } else {
            Mode::SingleShot(utils::join_command(&cli.command))
        };

        Ok(Self {
            endpoint: Endpoint::new(host, port),
            session: SessionOptions {
                connect_timeout: Duration::from_millis(connect_ms),
                read_timeout: Duration::from_millis(read_ms),
                decode,
            },
            run: RunOptions {
                pace: Duration::from_millis(pace_ms),
            },
            namespace,
            mode,
        })
    }

    /// Validate the resolved configuration.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error listing every problem found:
    /// - Port 0
    /// - Zero connect or read timeout
    /// - Empty host or namespace
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.endpoint.host.trim().is_empty() {
            errors.push("host cannot be empty".to_string());
        }

        if self.endpoint.port == 0 {
            errors.push(
                "port cannot be 0. Use the port the server listens on (1-65535)\n  \
                 The reference server defaults to 2000"
                    .to_string(),
            );
        }

        if self.session.connect_timeout.is_zero() {
            errors.push("connect timeout cannot be 0".to_string());
        }

        if self.session.read_timeout.is_zero() {
            errors.push(
                "read timeout cannot be 0. A zero timeout would block forever on a silent server"
                    .to_string(),
            );
        }

        if self.namespace.as_str().is_empty() {
            errors.push("namespace prefix cannot be empty".to_string());
        } else if self.namespace.as_str().contains(char::is_whitespace) {
            errors.push(format!(
                "namespace prefix '{}' contains whitespace\n  \
                 Keys are space-separated on the wire",
                self.namespace
            ));
        }

        let pace_ms = self.run.pace.as_millis();
        if pace_ms > u128::from(constants::MAX_REASONABLE_PACE_MS) {
            warnings.push(format!(
                "pace of {pace_ms}ms is very high (> {}ms)\n  \
                 The value is in milliseconds",
                constants::MAX_REASONABLE_PACE_MS
            ));
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}
