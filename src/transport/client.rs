// Client role - connects out to a listening consumer

use std::io;
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::{Duration, Instant};

use super::{Connection, Endpoint, FrameTransport, TransportError, write_through};

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

pub struct IpcClient {
    endpoint: Endpoint,
    connection: Option<Connection>,
    disposed: bool,
}

impl IpcClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connection: None,
            disposed: false,
        }
    }

    /// Connect to the endpoint, retrying until `timeout` elapses.
    ///
    /// A zero timeout makes a single attempt. Exactly one of the callbacks runs:
    /// `on_connected` once the stream is up, or `on_failed` when the peer could
    /// not be reached in time. Only unexpected failures are returned as errors.
    pub fn connect<C, F>(
        &mut self,
        timeout: Duration,
        on_connected: C,
        on_failed: F,
    ) -> Result<(), TransportError>
    where
        C: FnOnce(&Self),
        F: FnOnce(&Self, &io::Error),
    {
        if self.disposed {
            return Err(TransportError::Disposed("connect"));
        }
        if self.connection.is_some() {
            return Ok(());
        }

        let deadline = Instant::now() + timeout;
        loop {
            match UnixStream::connect(self.endpoint.path()) {
                Ok(stream) => {
                    self.connection = Some(Connection::new(stream));
                    tracing::debug!("Connected to {}", self.endpoint);
                    on_connected(self);
                    return Ok(());
                }
                Err(e) if is_fatal(&e) => {
                    return Err(TransportError::Io {
                        operation: "connect",
                        source: e,
                    });
                }
                Err(e) => {
                    let now = Instant::now();
                    if is_retryable(&e) && now < deadline {
                        thread::sleep(RETRY_INTERVAL.min(deadline - now));
                        continue;
                    }
                    tracing::debug!("Could not connect to {}: {}", self.endpoint, e);
                    on_failed(self, &e);
                    return Ok(());
                }
            }
        }
    }
}

impl FrameTransport for IpcClient {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.disposed {
            return Err(TransportError::Disposed("write to"));
        }
        write_through(&mut self.connection, &self.endpoint, payload)
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.disposed {
            return Err(TransportError::Disposed("read from"));
        }
        match self.connection.as_mut() {
            Some(conn) => conn.read_frame(),
            None => Ok(None),
        }
    }

    fn dispose(&mut self) {
        self.disposed = true;
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }
}

impl Drop for IpcClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Peer not listening yet.
fn is_retryable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused | io::ErrorKind::WouldBlock
    )
}

/// Failures no amount of waiting will fix.
fn is_fatal(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported
    )
}
