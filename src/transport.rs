//! One blocking TCP connection to the server under test.
//!
//! A [`Session`] is opened once per run with a single connect attempt (per
//! resolved address) bounded by the connect timeout. It is closed exactly
//! once: either explicitly through [`Session::close`], or by `Drop` when the
//! owner unwinds through an error. [`Session::scoped`] packages that pattern
//! for callers that want the close to happen before they report anything.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::codec::{self, DecodeStrategy, Reply};
use crate::constants::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_READ_TIMEOUT_MS};
use crate::error::{Error, Result};

/// Host and port of the server under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| Error::Resolve {
                endpoint: self.clone(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(Error::Resolve {
                endpoint: self.clone(),
                source: std::io::Error::new(ErrorKind::NotFound, "no addresses found"),
            });
        }
        Ok(addrs)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Timeouts and decoding applied to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub decode: DecodeStrategy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            decode: DecodeStrategy::default(),
        }
    }
}

/// A live connection to an [`Endpoint`].
#[derive(Debug)]
pub struct Session {
    endpoint: Endpoint,
    stream: Option<TcpStream>,
    options: SessionOptions,
}

impl Session {
    /// Connect to `endpoint`.
    ///
    /// # Errors
    ///
    /// - [`Error::Resolve`] if the host does not resolve
    /// - [`Error::ConnectTimeout`] if no address accepts within the window
    /// - [`Error::ConnectionRefused`] if nothing is listening
    /// - [`Error::Transport`] for any other socket failure
    pub fn open(endpoint: &Endpoint, options: SessionOptions) -> Result<Self> {
        let mut last_err = None;

        for addr in endpoint.resolve()? {
            debug!(%addr, timeout = ?options.connect_timeout, "Connecting");
            match TcpStream::connect_timeout(&addr, options.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(options.read_timeout))
                        .map_err(|e| Error::transport("setting read timeout", e))?;
                    stream
                        .set_nodelay(true)
                        .map_err(|e| Error::transport("disabling Nagle", e))?;
                    info!(%endpoint, %addr, "Connected");
                    return Ok(Self {
                        endpoint: endpoint.clone(),
                        stream: Some(stream),
                        options,
                    });
                },
                Err(e) => last_err = Some(e),
            }
        }

        // resolve() never returns an empty list, so at least one attempt failed
        let err = last_err.unwrap_or_else(|| std::io::Error::from(ErrorKind::NotFound));
        Err(match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Error::ConnectTimeout {
                endpoint: endpoint.clone(),
                timeout: options.connect_timeout,
            },
            ErrorKind::ConnectionRefused => Error::ConnectionRefused {
                endpoint: endpoint.clone(),
            },
            _ => Error::transport(format!("connecting to {endpoint}"), err),
        })
    }

    /// Open a session, hand it to `f`, and close it before returning.
    ///
    /// The session is closed whether `f` succeeds, fails or panics.
    ///
    /// # Errors
    ///
    /// Returns the connect error from [`Session::open`], or whatever `f` returns.
    pub fn scoped<T, E, F>(
        endpoint: &Endpoint,
        options: SessionOptions,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Session) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut session = Self::open(endpoint, options)?;
        let result = f(&mut session);
        session.close();
        result
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write a whole frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the session is closed or the write fails.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        let stream = self.stream_mut("sending frame")?;
        stream
            .write_all(frame)
            .and_then(|()| stream.flush())
            .map_err(|e| Error::transport("sending frame", e))?;
        debug!(bytes = frame.len(), "Sent frame");
        Ok(())
    }

    /// Encode and send `command`.
    ///
    /// # Errors
    ///
    /// See [`Session::send_frame`].
    pub fn send(&mut self, command: &str) -> Result<()> {
        self.send_frame(&codec::encode(command))
    }

    /// Collect one raw reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the session is closed or a read fails
    /// for a reason other than the read timeout.
    pub fn receive_reply(&mut self) -> Result<Reply> {
        let stream = self.stream_mut("receiving reply")?;
        codec::collect_reply(stream)
    }

    /// Collect one reply and decode it with the session's strategy.
    ///
    /// # Errors
    ///
    /// See [`Session::receive_reply`].
    pub fn receive(&mut self) -> Result<String> {
        let decode = self.options.decode;
        Ok(self.receive_reply()?.text(decode))
    }

    /// Single read of at most `limit` bytes, for peers that don't frame
    /// replies. Empty on timeout or peer close.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the session is closed or the read fails
    /// for a reason other than the read timeout.
    pub fn receive_chunk(&mut self, limit: usize) -> Result<Vec<u8>> {
        let stream = self.stream_mut("receiving chunk")?;
        let mut buf = vec![0u8; limit];
        loop {
            match stream.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(Vec::new());
                },
                Err(e) => return Err(Error::transport("receiving chunk", e)),
            }
        }
    }

    /// Close the connection. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!(error = %e, "Shutdown on close failed");
            }
            info!(endpoint = %self.endpoint, "Connection closed");
        }
    }

    fn stream_mut(&mut self, context: &str) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            Error::transport(
                context,
                std::io::Error::new(ErrorKind::NotConnected, "session already closed"),
            )
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
