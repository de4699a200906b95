//! Echo connectivity probe.
//!
//! Connects, sends one newline-terminated message, reads one chunk back and
//! checks that the trimmed reply equals the message. With `count > 1` the
//! probe repeats on a fresh connection each time and reports how many
//! attempts echoed correctly.

use anyhow::{Result, bail};
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use crate::codec::DecodeStrategy;
use crate::constants::ECHO_RECV_SIZE;
use crate::error::Error;
use crate::transport::{Endpoint, Session, SessionOptions};
use crate::ui;
use crate::utils::format_elapsed;

/// Settings for the echo probe.
#[derive(Debug, Clone)]
pub struct EchoConfig {
    pub endpoint: Endpoint,
    pub message: String,
    pub count: u32,
    pub interval: Duration,
    pub timeout: Duration,
}

/// Tally across attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoSummary {
    pub succeeded: u32,
    pub attempts: u32,
}

impl EchoSummary {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.attempts
    }
}

/// Run the probe, printing progress to stdout.
///
/// # Errors
///
/// Returns an error unless every attempt echoed the message back.
pub fn execute(config: &EchoConfig) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = execute_to(config, &mut out)?;

    if !summary.all_succeeded() {
        bail!(
            "Echo probe failed: {}/{} attempts echoed correctly",
            summary.succeeded,
            summary.attempts
        );
    }
    Ok(())
}

/// Run the probe, writing progress to `out`.
///
/// Connection failures are reported and counted as failed attempts; they
/// don't stop the remaining attempts.
///
/// # Errors
///
/// Returns an error only if writing to `out` fails.
pub fn execute_to<W: Write>(config: &EchoConfig, out: &mut W) -> Result<EchoSummary> {
    let attempts = config.count.max(1);
    let mut succeeded = 0;

    for i in 0..attempts {
        let message = if attempts > 1 {
            writeln!(out, "--- attempt {}/{attempts} ---", i + 1)?;
            format!("{} #{}", config.message, i + 1)
        } else {
            config.message.clone()
        };

        match probe_once(config, &message, out) {
            Ok(true) => succeeded += 1,
            Ok(false) => {},
            Err(e) => {
                writeln!(out, "Echo attempt failed: {e}")?;
                ui::report_error(&e);
            },
        }

        if i + 1 < attempts {
            thread::sleep(config.interval);
        }
    }

    if attempts > 1 {
        writeln!(out, "{succeeded}/{attempts} attempts succeeded")?;
    }

    Ok(EchoSummary {
        succeeded,
        attempts,
    })
}

fn probe_once<W: Write>(config: &EchoConfig, message: &str, out: &mut W) -> crate::Result<bool> {
    let options = SessionOptions {
        connect_timeout: config.timeout,
        read_timeout: config.timeout,
        decode: DecodeStrategy::Replace,
    };
    let started = Instant::now();

    Session::scoped(&config.endpoint, options, |session| {
        say(
            out,
            format_args!(
                "Connected to {} in {}",
                config.endpoint,
                format_elapsed(started.elapsed())
            ),
        )?;

        let frame = format!("{message}\n");
        session.send_frame(frame.as_bytes())?;
        say(out, format_args!("Sent: {message} ({} bytes)", frame.len()))?;

        let reply = session.receive_chunk(ECHO_RECV_SIZE)?;
        if reply.is_empty() {
            say(out, format_args!("No data returned by server"))?;
            return Ok(false);
        }

        let text = DecodeStrategy::Replace.decode(&reply);
        let echoed = text.trim();
        say(out, format_args!("Received: {echoed} ({} bytes)", reply.len()))?;

        if echoed == message {
            say(out, format_args!("Echo matched"))?;
            Ok(true)
        } else {
            say(out, format_args!("Echo did not match the sent message"))?;
            Ok(false)
        }
    })
}

fn say<W: Write>(out: &mut W, line: std::fmt::Arguments<'_>) -> crate::Result<()> {
    writeln!(out, "{line}").map_err(|e| Error::io("writing echo output", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    fn echo_server(replies: usize, mangle: bool) -> (Endpoint, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            for _ in 0..replies {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let mut stream = stream;
                if mangle {
                    stream.write_all(b"something else\n").unwrap();
                } else {
                    stream.write_all(line.as_bytes()).unwrap();
                }
            }
        });
        (Endpoint::new("127.0.0.1", port), handle)
    }

    fn config(endpoint: Endpoint, count: u32) -> EchoConfig {
        EchoConfig {
            endpoint,
            message: "hello".to_string(),
            count,
            interval: Duration::ZERO,
            timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_single_echo_matches() {
        let (endpoint, server) = echo_server(1, false);
        let mut out = Vec::new();

        let summary = execute_to(&config(endpoint, 1), &mut out).unwrap();
        server.join().unwrap();

        assert!(summary.all_succeeded());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Sent: hello (6 bytes)"));
        assert!(text.contains("Echo matched"));
    }

    #[test]
    fn test_mismatched_echo_fails() {
        let (endpoint, server) = echo_server(1, true);
        let mut out = Vec::new();

        let summary = execute_to(&config(endpoint, 1), &mut out).unwrap();
        server.join().unwrap();

        assert_eq!(summary.succeeded, 0);
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn test_repeated_attempts_use_numbered_messages() {
        let (endpoint, server) = echo_server(3, false);
        let mut out = Vec::new();

        let summary = execute_to(&config(endpoint, 3), &mut out).unwrap();
        server.join().unwrap();

        assert_eq!(summary, EchoSummary { succeeded: 3, attempts: 3 });
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Sent: hello #3"));
        assert!(text.ends_with("3/3 attempts succeeded\n"));
    }

    #[test]
    fn test_refused_counts_as_failed_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut out = Vec::new();
        let summary = execute_to(&config(Endpoint::new("127.0.0.1", port), 1), &mut out).unwrap();

        assert_eq!(summary.succeeded, 0);
        assert!(String::from_utf8(out).unwrap().contains("Echo attempt failed"));
    }
}
