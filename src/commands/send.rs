//! Single-shot mode.
//!
//! Sends one caller-assembled command and prints whatever comes back,
//! verbatim. Nothing is compared: this only shows that the server is
//! reachable and frames replies.

use anyhow::Result;
use std::io::{self, Write};

use crate::config::RunConfig;
use crate::transport::Session;

/// Send `command` and print the raw reply to stdout.
///
/// # Errors
///
/// See [`execute_to`].
pub fn execute(config: &RunConfig, command: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute_to(config, command, &mut out)
}

/// Send `command` and write the raw reply to `out`.
///
/// # Errors
///
/// Returns connection and transport errors. The reply content never causes
/// an error.
pub fn execute_to<W: Write>(config: &RunConfig, command: &str, out: &mut W) -> Result<()> {
    writeln!(out, "namespace: {}", config.namespace)?;
    writeln!(out, "> {command}")?;

    let reply = Session::scoped(&config.endpoint, config.session, |session| {
        session.send(command)?;
        session.receive()
    })?;

    write!(out, "{reply}")?;
    if !reply.ends_with('\n') {
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
