//! The fail-fast assertion loop.
//!
//! For each case, in order: render the command, send it, collect the reply,
//! trim it and compare it against the expected text. The first mismatch ends
//! the run; nothing after it is sent and nothing is retried. The transcript
//! goes to a caller-supplied writer:
//!
//! ```text
//! > SET ns1700000000_a 1
//! OK
//! > GET ns1700000000_a
//! OK 2
//! EXPECTED: OK 1
//! FAIL 1/23
//! ```
//!
//! Passing cases are followed by a short pause. The server is assumed to
//! process one connection's commands strictly in order; the pause only
//! smooths over servers that flush replies lazily and can be set to zero.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::constants::DEFAULT_PACE_MS;
use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::suite::TestCase;
use crate::transport::Session;

/// One request/reply round trip.
pub trait Exchange {
    /// Send `command` and return the decoded reply (untrimmed, possibly empty).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure. A reply that never arrives is
    /// not an error; it comes back as an empty string.
    fn exchange(&mut self, command: &str) -> Result<String>;
}

impl Exchange for Session {
    fn exchange(&mut self, command: &str) -> Result<String> {
        self.send(command)?;
        self.receive()
    }
}

/// Knobs for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Pause after each passing case (skipped after the last one).
    pub pace: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            pace: Duration::from_millis(DEFAULT_PACE_MS),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure {
        index: usize,
        command: String,
        expected: String,
        actual: String,
    },
}

/// Summary of one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub passed: usize,
    pub total: usize,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

impl RunResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Convert a failed run into [`Error::ProtocolMismatch`].
    ///
    /// # Errors
    ///
    /// Returns the mismatch if the run did not succeed.
    pub fn into_result(self) -> Result<Self> {
        match &self.outcome {
            Outcome::Success => Ok(self),
            Outcome::Failure {
                index,
                expected,
                actual,
                ..
            } => Err(Error::ProtocolMismatch {
                index: *index,
                expected: expected.clone(),
                actual: actual.clone(),
            }),
        }
    }
}

/// Run `cases` in order over `channel`, writing the transcript to `out`.
///
/// # Errors
///
/// Returns transport errors from `channel` and failures writing to `out`.
/// A mismatch is not an error here; it is reported through [`Outcome`].
pub fn run<X, W>(
    channel: &mut X,
    ns: &Namespace,
    cases: &[TestCase],
    options: RunOptions,
    out: &mut W,
) -> Result<RunResult>
where
    X: Exchange + ?Sized,
    W: Write + ?Sized,
{
    let total = cases.len();
    let started = Instant::now();
    let mut passed = 0;

    info!(namespace = %ns, total, "Starting run");

    for (index, case) in cases.iter().enumerate() {
        let command = case.render(ns);
        emit(out, format_args!("> {command}"))?;

        let reply = channel.exchange(&command)?;
        let actual = reply.trim();
        emit(out, format_args!("{actual}"))?;

        if actual != case.expect {
            emit(out, format_args!("EXPECTED: {}", case.expect))?;
            emit(out, format_args!("FAIL {passed}/{total}"))?;
            info!(index, passed, total, "Run failed");
            return Ok(RunResult {
                passed,
                total,
                outcome: Outcome::Failure {
                    index,
                    command,
                    expected: case.expect.clone(),
                    actual: actual.to_string(),
                },
                elapsed: started.elapsed(),
            });
        }

        passed += 1;
        debug!(index, "Case passed");

        if index + 1 < total && !options.pace.is_zero() {
            thread::sleep(options.pace);
        }
    }

    emit(out, format_args!("PASS {passed}/{total}"))?;
    info!(passed, total, "Run succeeded");

    Ok(RunResult {
        passed,
        total,
        outcome: Outcome::Success,
        elapsed: started.elapsed(),
    })
}

fn emit<W: Write + ?Sized>(out: &mut W, line: std::fmt::Arguments<'_>) -> Result<()> {
    writeln!(out, "{line}").map_err(|e| Error::io("writing transcript", e))
}
