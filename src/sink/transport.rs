// Framed IPC sink

use std::time::Duration;

use crate::codec::Encoded;
use crate::config::{SinkKind, TransportConfig, TransportMode};
use crate::error::SinkError;
use crate::event::NormalizedEvent;
use crate::transport::{Endpoint, FrameTransport, IpcClient, IpcServer, TransportError};

pub struct TransportSink {
    transport: Box<dyn FrameTransport>,
}

impl TransportSink {
    pub fn new(transport: Box<dyn FrameTransport>) -> Self {
        Self { transport }
    }

    /// Open the configured role and wait for the peer.
    ///
    /// Failing to meet a peer in time is logged, not returned: the sink stays
    /// usable and silently drops writes until then.
    pub fn open(config: &TransportConfig) -> Result<Self, TransportError> {
        let endpoint = Endpoint::resolve(&config.endpoint)?;
        let timeout = config.connection_timeout();

        let transport: Box<dyn FrameTransport> = match config.mode {
            TransportMode::Server => Box::new(start_server(endpoint, timeout)?),
            TransportMode::Client => Box::new(connect_client(endpoint, timeout)?),
        };

        Ok(Self::new(transport))
    }
}

fn start_server(endpoint: Endpoint, timeout: Duration) -> Result<IpcServer, TransportError> {
    tracing::info!("Waiting up to {:?} for a consumer on {}", timeout, endpoint);
    let mut server = IpcServer::new(endpoint);
    server.start(timeout)?;
    Ok(server)
}

fn connect_client(endpoint: Endpoint, timeout: Duration) -> Result<IpcClient, TransportError> {
    let mut client = IpcClient::new(endpoint);
    client.connect(
        timeout,
        |c| tracing::info!("Connected to consumer on {}", c.endpoint()),
        |c, e| tracing::warn!("No consumer on {} ({})", c.endpoint(), e),
    )?;
    Ok(client)
}

impl super::Sink for TransportSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Transport
    }

    fn deliver(&mut self, _event: &NormalizedEvent, payload: &Encoded) -> Result<(), SinkError> {
        self.transport.write(payload.as_bytes())?;
        Ok(())
    }

    fn close(&mut self) {
        self.transport.dispose();
    }
}
