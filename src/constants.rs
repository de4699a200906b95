//! Default values shared by the CLI, the config file and the core.

/// Line terminator for request and response frames.
pub const TERMINATOR: &[u8] = b"\r\n";

/// Size of the buffer handed to each `read` call.
pub const RECV_CHUNK_SIZE: usize = 4096;

/// Connect window for the assertion runner and single-shot mode.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

/// Per-request read timeout.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2000;

/// Pause after each passing case.
pub const DEFAULT_PACE_MS: u64 = 50;

/// Pacing above this is almost certainly a typo (seconds vs millis).
pub const MAX_REASONABLE_PACE_MS: u64 = 1000;

/// Prefix for time-derived namespaces.
pub const NAMESPACE_SEED_PREFIX: &str = "ns";

/// Default config file looked up in the current directory.
pub const CONFIG_FILE: &str = "kvprobe.toml";

/// Echo probe defaults.
pub const ECHO_DEFAULT_MESSAGE: &str = "Hello Echo Server!";
pub const ECHO_TIMEOUT_MS: u64 = 5000;
pub const ECHO_INTERVAL_MS: u64 = 1000;
pub const ECHO_RECV_SIZE: usize = 1024;
