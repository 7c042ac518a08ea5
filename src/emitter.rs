// Multi-sink emitter
//
// Serializes concurrent publishes, stamps run identity, encodes each event once
// and hands the same payload to every active sink. A failing sink never stops
// delivery to the others. The terminal report event tears everything down.

use std::fs;
use std::sync::{Arc, Mutex, PoisonError};

use crate::codec::{self, Encoded, WireFormat};
use crate::config::{Config, SinkKind};
use crate::error::{CodecError, MonitorError};
use crate::event::NormalizedEvent;
use crate::runtime::RuntimeIdentity;
use crate::sink::{ConsoleSink, LogFileSink, Sink, TransportSink};

/// Outcome of one [`Emitter::publish`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Encoded and offered to every sink
    Delivered { sinks: usize, failures: usize },
    /// Encoding failed; no sink saw the event
    Dropped,
    /// The emitter was already torn down
    Closed,
}

type Encoder = fn(&NormalizedEvent, WireFormat) -> Result<Encoded, CodecError>;

struct EmitterState {
    sinks: Vec<Box<dyn Sink>>,
}

impl EmitterState {
    fn close(mut self) {
        for sink in &mut self.sinks {
            sink.close();
        }
    }
}

pub struct Emitter {
    format: WireFormat,
    encode: Encoder,
    identity: Arc<RuntimeIdentity>,
    state: Mutex<Option<EmitterState>>,
}

impl Emitter {
    pub fn new(format: WireFormat, identity: Arc<RuntimeIdentity>, sinks: Vec<Box<dyn Sink>>) -> Self {
        Self {
            format,
            encode: codec::encode,
            identity,
            state: Mutex::new(Some(EmitterState { sinks })),
        }
    }

    /// Build the sinks the configuration activates.
    ///
    /// Blocks for up to the configured connection timeout while the transport
    /// waits for its peer.
    pub fn from_config(config: &Config, identity: Arc<RuntimeIdentity>) -> Result<Self, MonitorError> {
        config.validate()?;

        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        for kind in config.emit.sinks.iter() {
            match kind {
                SinkKind::Transport => {
                    sinks.push(Box::new(TransportSink::open(&config.transport)?));
                }
                SinkKind::LogFile => {
                    let path = &config.log.file;
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        fs::create_dir_all(parent).map_err(|source| MonitorError::CreateDir {
                            path: parent.to_path_buf(),
                            source,
                        })?;
                    }
                    sinks.push(Box::new(LogFileSink::new(path)));
                }
                SinkKind::Console => {
                    sinks.push(Box::new(ConsoleSink::new(config.emit.output_stream)));
                }
                SinkKind::Rpc => push_rpc_sink(&mut sinks, config)?,
            }
        }

        tracing::debug!(
            sinks = ?sinks.iter().map(|s| s.kind().as_str()).collect::<Vec<_>>(),
            format = %config.emit.format,
            "Emitter ready"
        );
        Ok(Self::new(config.emit.format, identity, sinks))
    }

    #[cfg(test)]
    fn with_encoder(mut self, encode: Encoder) -> Self {
        self.encode = encode;
        self
    }

    /// Whether the emitter can still deliver events.
    pub fn is_open(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stamp, encode and deliver one event to every sink.
    pub fn publish(&self, mut event: NormalizedEvent) -> Delivery {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(state) = guard.as_mut() else {
            tracing::debug!(event = %event.kind(), "Emitter closed, ignoring event");
            return Delivery::Closed;
        };

        self.stamp(&mut event);

        let delivery = match (self.encode)(&event, self.format) {
            Ok(payload) => deliver_all(state, &event, &payload),
            Err(e) => {
                tracing::error!(
                    operation = "encode",
                    event = %event.kind(),
                    format = %self.format,
                    error = %e,
                    "Dropping event that failed to encode"
                );
                Delivery::Dropped
            }
        };

        if event.kind().is_terminal() {
            tracing::info!("Run report published, shutting down sinks");
            if let Some(state) = guard.take() {
                state.close();
            }
        }

        delivery
    }

    /// Release every sink. Later publishes report [`Delivery::Closed`].
    pub fn close(&self) {
        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(state) = state {
            state.close();
        }
    }

    fn stamp(&self, event: &mut NormalizedEvent) {
        let identity = &self.identity;
        event.test_run_id = identity.run_id;
        event.test_runner = identity.process_name.clone();
        event.process_id = identity.process_id;
        event.process_session = identity.process_session;
        event.runtime = identity.runtime.clone();
        event.runtime_version = identity.runtime_version.clone();
    }
}

fn deliver_all(state: &mut EmitterState, event: &NormalizedEvent, payload: &Encoded) -> Delivery {
    let mut failures = 0;
    for sink in state.sinks.iter_mut() {
        if let Err(e) = sink.deliver(event, payload) {
            failures += 1;
            tracing::warn!(
                operation = "deliver",
                sink = sink.kind().as_str(),
                event = %event.kind(),
                error = %e,
                "Sink delivery failed"
            );
        }
    }
    Delivery::Delivered {
        sinks: state.sinks.len(),
        failures,
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(feature = "rpc")]
fn push_rpc_sink(sinks: &mut Vec<Box<dyn Sink>>, config: &Config) -> Result<(), MonitorError> {
    let sink = crate::sink::RpcSink::connect(&config.rpc, config.emit.format)?;
    sinks.push(Box::new(sink));
    Ok(())
}

#[cfg(not(feature = "rpc"))]
fn push_rpc_sink(_sinks: &mut Vec<Box<dyn Sink>>, _config: &Config) -> Result<(), MonitorError> {
    tracing::warn!("RPC sink requested but this build has no rpc support; skipping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::event::EventKind;
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<(EventKind, Encoded)>>>,
        closed: Arc<Mutex<u32>>,
    }

    impl Sink for Recorder {
        fn kind(&self) -> SinkKind {
            SinkKind::Console
        }

        fn deliver(&mut self, event: &NormalizedEvent, payload: &Encoded) -> Result<(), SinkError> {
            self.seen.lock().unwrap().push((event.kind(), payload.clone()));
            Ok(())
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    fn identity() -> Arc<RuntimeIdentity> {
        Arc::new(RuntimeIdentity::fixed(Uuid::nil(), "runner").with_runtime("native", "2.0"))
    }

    #[test]
    fn test_publish_stamps_identity() {
        let recorder = Recorder::default();
        let emitter = Emitter::new(WireFormat::Json, identity(), vec![Box::new(recorder.clone())]);

        let delivery = emitter.publish(NormalizedEvent::new(EventKind::StartTest));
        assert_eq!(delivery, Delivery::Delivered { sinks: 1, failures: 0 });

        let seen = recorder.seen.lock().unwrap();
        let text = seen[0].1.as_text().expect("json is text");
        assert!(text.contains("\"TestRunner\":\"runner\""));
        assert!(text.contains("\"RuntimeVersion\":\"2.0\""));
    }

    #[test]
    fn test_report_closes_sinks_once() {
        let recorder = Recorder::default();
        let emitter = Emitter::new(WireFormat::Xml, identity(), vec![Box::new(recorder.clone())]);

        emitter.publish(NormalizedEvent::new(EventKind::Report));
        assert!(!emitter.is_open());
        assert_eq!(
            emitter.publish(NormalizedEvent::new(EventKind::EndTest)),
            Delivery::Closed
        );

        emitter.close();
        drop(emitter);
        assert_eq!(*recorder.closed.lock().unwrap(), 1);
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    fn refuse_to_encode(_event: &NormalizedEvent, _format: WireFormat) -> Result<Encoded, CodecError> {
        Err(CodecError::Unsupported { format: "json" })
    }

    #[test]
    fn test_unencodable_event_reaches_no_sink() {
        let recorder = Recorder::default();
        let emitter = Emitter::new(WireFormat::Json, identity(), vec![Box::new(recorder.clone())])
            .with_encoder(refuse_to_encode);

        assert_eq!(
            emitter.publish(NormalizedEvent::new(EventKind::EndTest)),
            Delivery::Dropped
        );
        assert!(emitter.is_open());
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unencodable_report_still_tears_down() {
        let recorder = Recorder::default();
        let emitter = Emitter::new(WireFormat::Json, identity(), vec![Box::new(recorder.clone())])
            .with_encoder(refuse_to_encode);

        assert_eq!(
            emitter.publish(NormalizedEvent::new(EventKind::Report)),
            Delivery::Dropped
        );
        assert!(!emitter.is_open());
        assert!(recorder.seen.lock().unwrap().is_empty());
        assert_eq!(*recorder.closed.lock().unwrap(), 1);
    }
}
