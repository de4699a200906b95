//! Error types for the harness core.
//!
//! Connection-level failures are never partially recovered: they bubble up to
//! the command layer, get printed with hints and turn into a non-zero exit.
//! Malformed reply bytes are not errors at all (see [`crate::codec`]).

use std::time::Duration;

use crate::transport::Endpoint;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Harness errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No connection within the connect window.
    #[error("connection to {endpoint} timed out after {}ms", .timeout.as_millis())]
    ConnectTimeout { endpoint: Endpoint, timeout: Duration },

    /// Endpoint reachable but nothing is listening.
    #[error("connection to {endpoint} refused")]
    ConnectionRefused { endpoint: Endpoint },

    /// Host name did not resolve to any address.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    /// Any other socket-level failure.
    #[error("transport error while {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A reply did not equal the expected value.
    #[error("case {index} failed: expected '{expected}', got '{actual}'")]
    ProtocolMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    /// Invalid configuration or case file.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local I/O failure (writing the transcript).
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a transport error with context.
    pub fn transport(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    /// Create a local IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns true for errors raised while establishing the connection.
    #[must_use]
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. } | Self::ConnectionRefused { .. } | Self::Resolve { .. }
        )
    }

    /// Short title for the error box.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::ConnectTimeout { .. } => "Connection Timed Out",
            Self::ConnectionRefused { .. } => "Connection Refused",
            Self::Resolve { .. } => "Host Not Resolved",
            Self::Transport { .. } => "Transport Error",
            Self::ProtocolMismatch { .. } => "Protocol Mismatch",
            Self::Config(_) => "Configuration Error",
            Self::Io { .. } => "IO Error",
        }
    }

    /// Actionable troubleshooting hints for the operator.
    #[must_use]
    pub fn hints(&self) -> Vec<String> {
        match self {
            Self::ConnectTimeout { endpoint, .. } => vec![
                "Is the server running?".to_string(),
                format!("Are the host and port correct? (tried {endpoint})"),
                format!(
                    "Does a firewall or security group allow port {}?",
                    endpoint.port
                ),
            ],
            Self::ConnectionRefused { endpoint } => vec![format!(
                "The server is not listening on {endpoint}. Start it or check the port."
            )],
            Self::Resolve { endpoint, .. } => {
                vec![format!("Check the host name '{}'.", endpoint.host)]
            },
            Self::Transport { .. } => {
                vec!["The connection failed mid-run. Check the server logs.".to_string()]
            },
            Self::ProtocolMismatch { .. } | Self::Config(_) | Self::Io { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn endpoint() -> Endpoint {
        Endpoint::new("10.0.0.1", 2000)
    }

    #[test]
    fn test_connect_timeout_message() {
        let err = Error::ConnectTimeout {
            endpoint: endpoint(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(err.to_string(), "connection to 10.0.0.1:2000 timed out after 3000ms");
        assert!(err.is_connect_failure());
        assert_eq!(err.hints().len(), 3);
        assert!(err.hints()[2].contains("2000"));
    }

    #[test]
    fn test_refused_hint_names_endpoint() {
        let err = Error::ConnectionRefused {
            endpoint: endpoint(),
        };
        assert!(err.is_connect_failure());
        assert!(err.hints()[0].contains("10.0.0.1:2000"));
    }

    #[test]
    fn test_transport_is_not_connect_failure() {
        let err = Error::transport("sending frame", io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(!err.is_connect_failure());
        assert!(err.to_string().starts_with("transport error while sending frame"));
    }

    #[test]
    fn test_mismatch_has_no_hints() {
        let err = Error::ProtocolMismatch {
            index: 4,
            expected: "OK 2".to_string(),
            actual: "OK 1".to_string(),
        };
        assert!(err.hints().is_empty());
        assert_eq!(err.title(), "Protocol Mismatch");
    }
}
