// Transport module - framed local IPC between the monitor and its consumer

pub mod client;
pub mod frame;
pub mod server;

pub use client::IpcClient;
pub use frame::{MAX_PAYLOAD_LEN, decode_frame, encode_frame, read_frame};
pub use server::IpcServer;

use bytes::BytesMut;
use std::fmt;
use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use thiserror::Error;

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport {operation} failed: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("payload of {len} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("cannot {0} a disposed transport")]
    Disposed(&'static str),
}

impl TransportError {
    /// Whether the peer has gone away and the connection is unusable.
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Well-known local endpoint both roles meet at.
///
/// A bare name resolves to a socket file in the temp directory; anything that
/// looks like a path is used as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    path: PathBuf,
}

impl Endpoint {
    pub fn resolve(name: &str) -> Result<Self, TransportError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.contains('\0') {
            return Err(TransportError::InvalidEndpoint(name.to_string()));
        }

        let path = if trimmed.contains(std::path::MAIN_SEPARATOR) || trimmed.contains('/') {
            PathBuf::from(trimmed)
        } else {
            std::env::temp_dir().join(format!("{}.sock", trimmed))
        };

        Ok(Self {
            name: trimmed.to_string(),
            path,
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Frame-level operations shared by both transport roles.
pub trait FrameTransport: Send {
    fn endpoint(&self) -> &Endpoint;

    fn is_connected(&self) -> bool;

    /// Send one payload as a single frame. Silently does nothing while no
    /// peer is connected.
    fn write(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Next frame from the peer, or `None` at end of stream or while
    /// disconnected.
    fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Release the connection. Safe to call any number of times.
    fn dispose(&mut self);
}

/// An established stream plus the buffer frames are assembled in.
pub(crate) struct Connection {
    stream: UnixStream,
    buffer: BytesMut,
}

impl Connection {
    pub(crate) fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    pub(crate) fn write_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        encode_frame(payload, &mut self.buffer)?;
        self.stream
            .write_all(&self.buffer)
            .and_then(|()| self.stream.flush())
            .map_err(|source| TransportError::Io {
                operation: "write",
                source,
            })
    }

    pub(crate) fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        read_frame(&mut self.stream)
    }

    pub(crate) fn close(self) {
        // Peer may already be gone
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Write through an optional connection, dropping it once the peer is gone.
pub(crate) fn write_through(
    connection: &mut Option<Connection>,
    endpoint: &Endpoint,
    payload: &[u8],
) -> Result<(), TransportError> {
    let Some(conn) = connection.as_mut() else {
        return Ok(());
    };

    match conn.write_frame(payload) {
        Ok(()) => Ok(()),
        Err(e) if e.is_disconnect() => {
            tracing::warn!("Peer on {} disconnected: {}", endpoint, e);
            if let Some(conn) = connection.take() {
                conn.close();
            }
            Err(e)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_resolves_to_temp_socket() {
        let endpoint = Endpoint::resolve("TestMonitorExtension").expect("resolve");
        assert_eq!(endpoint.name(), "TestMonitorExtension");
        assert_eq!(
            endpoint.path(),
            std::env::temp_dir().join("TestMonitorExtension.sock")
        );
    }

    #[test]
    fn test_path_is_used_as_given() {
        let endpoint = Endpoint::resolve("/run/monitor/events.sock").expect("resolve");
        assert_eq!(endpoint.path(), Path::new("/run/monitor/events.sock"));
    }

    #[test]
    fn test_empty_name_is_invalid() {
        assert!(matches!(
            Endpoint::resolve("  "),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_disconnect_classification() {
        let broken = TransportError::Io {
            operation: "write",
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        };
        assert!(broken.is_disconnect());

        let denied = TransportError::Io {
            operation: "write",
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(!denied.is_disconnect());
        assert!(!TransportError::Disposed("write").is_disconnect());
    }
}
