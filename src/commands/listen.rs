// Listen command - the consumer side of the transport

use anyhow::{Context, Result, bail};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::args::ListenArgs;
use crate::codec;
use crate::config::{Config, TransportMode};
use crate::error::CodecError;
use crate::sink::console::summary;
use crate::transport::{Endpoint, FrameTransport, IpcClient, IpcServer};

pub fn handle_listen(config: &Config, args: &ListenArgs) -> Result<()> {
    let mode = args.mode.unwrap_or_else(|| config.transport.mode.opposite());
    let endpoint = Endpoint::resolve(args.endpoint.as_deref().unwrap_or(&config.transport.endpoint))?;
    let format = args.format.unwrap_or(config.emit.format);
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.transport.connection_timeout());

    let mut transport = open(mode, endpoint, timeout)?;
    info!("Listening on {} ({} frames)", transport.endpoint(), format);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut received = 0u32;

    while let Some(frame) = transport.read().context("failed to read frame")? {
        received += 1;
        if args.raw {
            out.write_all(&frame)?;
            out.write_all(b"\n")?;
        }

        match codec::decode(&frame, format) {
            Ok(mut event) => {
                event.run_number = received;
                if !args.raw
                    && let Some(line) = summary(&event)
                {
                    writeln!(out, "{:>5} {}", event.run_number, line)?;
                }
                if event.kind().is_terminal() {
                    break;
                }
            }
            Err(CodecError::Unsupported { .. }) => {
                let text = String::from_utf8_lossy(&frame);
                if !args.raw {
                    writeln!(out, "{:>5} {}", received, text)?;
                }
                if text.starts_with("<DataEvent Event=\"Report\"") {
                    break;
                }
            }
            Err(e) => warn!("Could not decode frame {}: {}", received, e),
        }
        out.flush()?;
    }

    transport.dispose();
    info!("Received {} events", received);
    Ok(())
}

fn open(mode: TransportMode, endpoint: Endpoint, timeout: Duration) -> Result<Box<dyn FrameTransport>> {
    match mode {
        TransportMode::Server => {
            let mut server = IpcServer::new(endpoint);
            if !server.start(timeout)? {
                bail!("no monitor connected within {:?}", timeout);
            }
            Ok(Box::new(server))
        }
        TransportMode::Client => {
            let mut client = IpcClient::new(endpoint);
            let mut failure = None;
            client.connect(timeout, |_| {}, |_, e| failure = Some(e.to_string()))?;
            if let Some(reason) = failure {
                bail!("could not reach monitor on {}: {}", client.endpoint(), reason);
            }
            Ok(Box::new(client))
        }
    }
}
