// Remote RPC sink - one unary call per event

use http::uri::PathAndQuery;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tonic::client::Grpc;
use tonic::transport::Channel;
use tonic_prost::ProstCodec;

use crate::codec::{Encoded, WireFormat};
use crate::config::{RpcConfig, SinkKind};
use crate::error::{MonitorError, SinkError};
use crate::event::NormalizedEvent;

pub const WRITE_EVENT_PATH: &str = "/testmonitor.TestEvent/WriteTestEvent";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, PartialEq, prost::Message)]
pub struct TestEventRequest {
    /// Encoded event for the text formats
    #[prost(string, tag = "1")]
    pub event: String,
    /// Encoded event for the binary format
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    #[prost(string, tag = "3")]
    pub format: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TestEventReply {}

impl TestEventRequest {
    pub fn new(payload: &Encoded, format: WireFormat) -> Self {
        match payload {
            Encoded::Text(text) => Self {
                event: text.clone(),
                payload: Vec::new(),
                format: format.to_string(),
            },
            Encoded::Binary(bytes) => Self {
                event: String::new(),
                payload: bytes.clone(),
                format: format.to_string(),
            },
        }
    }
}

/// Forwards events to a remote collector. Owns a private runtime so the
/// synchronous publish path can drive the async client.
pub struct RpcSink {
    runtime: Option<Runtime>,
    client: Grpc<Channel>,
    format: WireFormat,
    target: String,
}

impl RpcSink {
    /// Prepare a lazily connected channel. No network traffic happens until
    /// the first delivery.
    pub fn connect(config: &RpcConfig, format: WireFormat) -> Result<Self, MonitorError> {
        let target = format!("http://{}:{}", config.host, config.port);

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| MonitorError::Rpc(format!("failed to start runtime: {}", e)))?;

        let endpoint = Channel::from_shared(target.clone())
            .map_err(|e| MonitorError::Rpc(format!("invalid address {}: {}", target, e)))?
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(REQUEST_TIMEOUT);

        let channel = {
            let _guard = runtime.enter();
            endpoint.connect_lazy()
        };

        tracing::debug!("RPC sink targeting {}", target);
        Ok(Self {
            runtime: Some(runtime),
            client: Grpc::new(channel),
            format,
            target,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn block_on<F>(&self, future: F) -> Result<(), SinkError>
    where
        F: Future<Output = Result<(), SinkError>> + Send,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            return Err(SinkError::Rpc("sink is closed".to_string()));
        };

        if Handle::try_current().is_err() {
            return runtime.block_on(future);
        }

        // Nested block_on panics inside a runtime; drive it from a plain thread
        std::thread::scope(|scope| {
            scope
                .spawn(|| runtime.block_on(future))
                .join()
                .unwrap_or_else(|_| Err(SinkError::Rpc("rpc worker panicked".to_string())))
        })
    }
}

impl super::Sink for RpcSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Rpc
    }

    fn deliver(&mut self, _event: &NormalizedEvent, payload: &Encoded) -> Result<(), SinkError> {
        let request = TestEventRequest::new(payload, self.format);
        let mut client = self.client.clone();

        self.block_on(async move {
            client
                .ready()
                .await
                .map_err(|e| SinkError::Rpc(format!("channel not ready: {}", e)))?;

            client
                .unary(
                    tonic::Request::new(request),
                    PathAndQuery::from_static(WRITE_EVENT_PATH),
                    ProstCodec::<TestEventRequest, TestEventReply>::default(),
                )
                .await
                .map_err(|status| SinkError::Rpc(status.message().to_string()))?;

            Ok(())
        })
    }

    fn close(&mut self) {
        // Plain drop would block, which panics when closed from async code
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for RpcSink {
    fn drop(&mut self) {
        super::Sink::close(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::sink::Sink;

    fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    }

    #[test]
    fn test_request_carries_text_or_bytes() {
        let text = TestEventRequest::new(&Encoded::Text("{}".to_string()), WireFormat::Json);
        assert_eq!(text.event, "{}");
        assert!(text.payload.is_empty());
        assert_eq!(text.format, "json");

        let binary = TestEventRequest::new(&Encoded::Binary(vec![8, 1]), WireFormat::Binary);
        assert!(binary.event.is_empty());
        assert_eq!(binary.payload, vec![8, 1]);
    }

    #[test]
    fn test_unreachable_collector_is_a_delivery_error() {
        let config = RpcConfig {
            host: "127.0.0.1".to_string(),
            port: unused_port(),
        };
        let mut sink = RpcSink::connect(&config, WireFormat::Json).expect("connect");
        assert!(sink.target().starts_with("http://127.0.0.1:"));

        let event = NormalizedEvent::new(EventKind::StartRun);
        let result = sink.deliver(&event, &Encoded::Text("{}".to_string()));
        assert!(matches!(result, Err(SinkError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_delivery_from_inside_a_runtime_does_not_panic() {
        let config = RpcConfig {
            host: "127.0.0.1".to_string(),
            port: unused_port(),
        };
        let mut sink = RpcSink::connect(&config, WireFormat::Json).expect("connect");
        let event = NormalizedEvent::new(EventKind::StartRun);
        assert!(sink.deliver(&event, &Encoded::Text("{}".to_string())).is_err());
    }
}
