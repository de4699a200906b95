//! Request framing and response collection.
//!
//! Requests are the command text plus CRLF. Replies are accumulated from as
//! many reads as it takes to see the terminator, the peer closing the
//! connection, or the read timeout expiring. A timeout is not an error here:
//! whatever arrived (possibly nothing) is handed upward and the comparison in
//! the runner decides.
//!
//! Servers under test sometimes emit garbage. Decoding never fails; invalid
//! UTF-8 is handled by an explicit [`DecodeStrategy`].

use std::io::{ErrorKind, Read};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::{RECV_CHUNK_SIZE, TERMINATOR};
use crate::error::{Error, Result};

/// Build a request frame for `command`.
#[must_use]
pub fn encode(command: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(command.len() + TERMINATOR.len());
    frame.extend_from_slice(command.as_bytes());
    frame.extend_from_slice(TERMINATOR);
    frame
}

/// How to turn reply bytes that are not valid UTF-8 into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DecodeStrategy {
    /// Substitute U+FFFD for each invalid sequence.
    #[default]
    Replace,
    /// Drop invalid sequences.
    Ignore,
}

impl DecodeStrategy {
    /// Decode `bytes` without ever failing.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Replace => String::from_utf8_lossy(bytes).into_owned(),
            Self::Ignore => bytes.utf8_chunks().map(|chunk| chunk.valid()).collect(),
        }
    }
}

/// Why collection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The terminator showed up in the newest bytes.
    Terminated,
    /// A read returned zero bytes.
    PeerClosed,
    /// The read timeout expired without new data.
    TimedOut,
}

/// Raw reply bytes plus the condition that ended collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub bytes: Vec<u8>,
    pub stop: StopReason,
}

impl Reply {
    #[must_use]
    pub fn text(&self, strategy: DecodeStrategy) -> String {
        strategy.decode(&self.bytes)
    }
}

/// Read one reply from `reader`.
///
/// The reader's own timeout is the safety valve: a `WouldBlock` or `TimedOut`
/// error ends collection with [`StopReason::TimedOut`].
///
/// # Errors
///
/// Returns [`Error::Transport`] for read failures other than a timeout.
pub fn collect_reply<R: Read>(reader: &mut R) -> Result<Reply> {
    let mut acc = Vec::new();
    let mut buf = [0u8; RECV_CHUNK_SIZE];

    let stop = loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break StopReason::PeerClosed,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                break StopReason::TimedOut;
            },
            Err(e) => return Err(Error::transport("receiving reply", e)),
        };

        // Look back one byte so a CRLF split across reads is still seen.
        let window_start = acc.len().saturating_sub(TERMINATOR.len() - 1);
        acc.extend_from_slice(&buf[..n]);
        debug!(bytes = n, total = acc.len(), "Received chunk");

        if contains_terminator(&acc[window_start..]) {
            break StopReason::Terminated;
        }
    };

    match stop {
        StopReason::Terminated => {},
        StopReason::PeerClosed => debug!(total = acc.len(), "Peer closed connection"),
        StopReason::TimedOut => warn!(
            total = acc.len(),
            "Read timed out, returning partial reply"
        ),
    }

    Ok(Reply { bytes: acc, stop })
}

/// Read one reply and decode it.
///
/// # Errors
///
/// See [`collect_reply`].
pub fn collect<R: Read>(reader: &mut R, strategy: DecodeStrategy) -> Result<String> {
    Ok(collect_reply(reader)?.text(strategy))
}

fn contains_terminator(bytes: &[u8]) -> bool {
    bytes.windows(TERMINATOR.len()).any(|w| w == TERMINATOR)
}
