//! Assertion runner command.
//!
//! Prints the namespace, connects once, drives every case through
//! [`runner::run`] and closes the connection before the summary is returned.

use anyhow::{Context, Result, bail};
use std::io::{self, Write};

use crate::config::{CaseSource, Mode, RunConfig};
use crate::runner::{self, RunResult};
use crate::suite::{self, TestCase};
use crate::transport::Session;
use crate::utils::format_elapsed;

/// Run the configured cases, writing the transcript to stdout.
///
/// # Errors
///
/// See [`execute_to`].
pub fn execute(config: &RunConfig) -> Result<RunResult> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute_to(config, &mut out)
}

/// Run the configured cases, writing the transcript to `out`.
///
/// # Errors
///
/// Returns an error if the case file cannot be loaded, the connection cannot
/// be established, or the connection fails mid-run. An assertion mismatch is
/// reported through the returned [`RunResult`], not as an error.
pub fn execute_to<W: Write>(config: &RunConfig, out: &mut W) -> Result<RunResult> {
    let cases = load_cases(config)?;

    writeln!(out, "namespace: {}", config.namespace)?;

    let result = Session::scoped(&config.endpoint, config.session, |session| {
        runner::run(session, &config.namespace, &cases, config.run, out)
    })?;

    tracing::info!(
        passed = result.passed,
        total = result.total,
        elapsed = %format_elapsed(result.elapsed),
        "Run finished"
    );

    Ok(result)
}

fn load_cases(config: &RunConfig) -> Result<Vec<TestCase>> {
    match &config.mode {
        Mode::Assert(CaseSource::Builtin(suite)) => Ok(suite.cases()),
        Mode::Assert(CaseSource::File(path)) => suite::load_cases(path)
            .with_context(|| format!("Failed to load cases from {}", path.display())),
        Mode::SingleShot(_) => bail!("single-shot configuration passed to the assertion runner"),
    }
}
