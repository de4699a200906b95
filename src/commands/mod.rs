//! Command implementations behind the kvprobe CLI.
//!
//! - [`check`] - assertion runner over a built-in suite or a case file
//! - [`send`] - single-shot mode: one command, raw reply
//! - [`echo`] - connectivity probe against an echo server

pub mod check;
pub mod echo;
pub mod send;

use anyhow::Result;

use crate::config::{Mode, RunConfig};

/// Dispatch a resolved run to the assertion runner or single-shot mode.
///
/// # Errors
///
/// Returns connection and transport errors, and a
/// [`crate::Error::ProtocolMismatch`] when an assertion fails.
pub fn execute(config: &RunConfig) -> Result<()> {
    match &config.mode {
        Mode::SingleShot(command) => send::execute(config, command),
        Mode::Assert(_) => {
            check::execute(config)?.into_result()?;
            Ok(())
        },
    }
}
