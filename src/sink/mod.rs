// Sink module - destinations an encoded event is delivered to

pub mod console;
pub mod log_file;
#[cfg(feature = "rpc")]
pub mod rpc;
pub mod transport;

pub use console::ConsoleSink;
pub use log_file::LogFileSink;
#[cfg(feature = "rpc")]
pub use rpc::RpcSink;
pub use transport::TransportSink;

use crate::codec::Encoded;
use crate::config::SinkKind;
use crate::error::SinkError;
use crate::event::NormalizedEvent;

/// One delivery destination.
///
/// The emitter calls sinks one at a time under its own lock, so implementations
/// need no internal synchronisation.
pub trait Sink: Send {
    fn kind(&self) -> SinkKind;

    fn deliver(&mut self, event: &NormalizedEvent, payload: &Encoded) -> Result<(), SinkError>;

    /// Release any held resources. Called once, after the last delivery.
    fn close(&mut self) {}
}
