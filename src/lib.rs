//! kvprobe - conformance harness for line-oriented key-value servers.
//!
//! The harness opens one TCP connection to a running server, sends
//! CRLF-terminated commands and checks the exact textual replies. It is built
//! from a few small layers:
//!
//! - [`transport`] - one blocking connection with connect/read timeouts
//! - [`codec`] - request framing and tolerant response collection
//! - [`namespace`] - per-run key prefixes so repeated runs don't collide
//! - [`suite`] - the built-in case sequences and TOML case files
//! - [`runner`] - the fail-fast assertion loop
//!
//! The CLI (`src/main.rs`) wires these together through [`commands`].

pub mod codec;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod namespace;
pub mod runner;
pub mod suite;
pub mod transport;
pub mod ui;
pub mod utils;

pub use error::{Error, Result};
