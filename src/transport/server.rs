// Server role - waits for a single consumer to connect

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::{Connection, Endpoint, FrameTransport, TransportError, write_through};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct IpcServer {
    endpoint: Endpoint,
    connection: Option<Connection>,
    disposed: bool,
}

impl IpcServer {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connection: None,
            disposed: false,
        }
    }

    /// Listen on the endpoint and wait up to `timeout` for one peer.
    ///
    /// Returns whether a peer connected. When the wait times out the pending
    /// accept is cancelled and the endpoint is released.
    pub fn start(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        if self.disposed {
            return Err(TransportError::Disposed("start"));
        }
        if self.connection.is_some() {
            return Ok(true);
        }

        self.remove_stale_socket()?;
        let listener = UnixListener::bind(self.endpoint.path()).map_err(|source| {
            TransportError::Io {
                operation: "bind",
                source,
            }
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| TransportError::Io {
                operation: "bind",
                source,
            })?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let accept_cancelled = Arc::clone(&cancelled);
        let handle = thread::Builder::new()
            .name("testmonitor-accept".to_string())
            .spawn(move || accept_loop(listener, &accept_cancelled, tx))
            .map_err(|source| TransportError::Io {
                operation: "spawn accept thread",
                source,
            })?;

        let outcome = wait_for_peer(&rx, timeout, || {
            cancelled.store(true, Ordering::SeqCst);
            let _ = handle.join();
        });
        // Established connections outlive the socket file
        if let Err(e) = self.remove_stale_socket() {
            tracing::debug!("Could not release {}: {}", self.endpoint, e);
        }

        match outcome {
            Some(Ok(stream)) => {
                tracing::debug!("Consumer connected on {}", self.endpoint);
                self.connection = Some(Connection::new(stream));
                Ok(true)
            }
            Some(Err(e)) => {
                tracing::warn!("Accept on {} failed: {}", self.endpoint, e);
                Ok(false)
            }
            None => {
                tracing::warn!(
                    "Timed out after {:?} waiting for a consumer on {}",
                    timeout,
                    self.endpoint
                );
                Ok(false)
            }
        }
    }

    /// Remove a socket left at the endpoint. Anything else there is refused.
    fn remove_stale_socket(&self) -> Result<(), TransportError> {
        let path = self.endpoint.path();
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_socket() => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(TransportError::Io {
                    operation: "remove stale socket",
                    source,
                }),
            },
            Ok(_) => Err(TransportError::InvalidEndpoint(format!(
                "{} exists and is not a socket",
                path.display()
            ))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TransportError::Io {
                operation: "inspect endpoint",
                source,
            }),
        }
    }
}

/// Wait for the accept thread's result, then stop it. A peer accepted
/// between the deadline and the stop still counts.
fn wait_for_peer<T>(rx: &mpsc::Receiver<T>, timeout: Duration, stop: impl FnOnce()) -> Option<T> {
    let outcome = rx.recv_timeout(timeout).ok();
    stop();
    outcome.or_else(|| rx.try_recv().ok())
}

fn accept_loop(
    listener: UnixListener,
    cancelled: &AtomicBool,
    tx: mpsc::Sender<io::Result<UnixStream>>,
) {
    while !cancelled.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                let _ = tx.send(stream.set_nonblocking(false).map(|()| stream));
                return;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

impl FrameTransport for IpcServer {
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
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.dispose();
    }
}
