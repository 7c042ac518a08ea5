pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod emitter;
pub mod error;
pub mod event;
pub mod logging;
pub mod monitor;
pub mod runtime;
pub mod sink;
pub mod translate;
pub mod transport;

pub use emitter::{Delivery, Emitter};
pub use event::{EventKind, NormalizedEvent, TestStatus};
pub use monitor::TestMonitor;
pub use runtime::RuntimeIdentity;
pub use translate::Translator;
