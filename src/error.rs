// Error types shared across the pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Failure to convert a raw report fragment into events.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("malformed report fragment: {0}")]
    Malformed(#[from] roxmltree::Error),
}

/// Failure to encode or decode an event in a wire format.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json codec failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary decode failed: {0}")]
    Binary(#[from] prost::DecodeError),

    #[error("binary record has unknown {field} value {value}")]
    UnknownValue { field: &'static str, value: i32 },

    #[error("{format} format does not support decoding")]
    Unsupported { format: &'static str },

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Failure delivering one encoded event to one sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to append to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("console write failed: {0}")]
    Console(#[source] std::io::Error),

    #[error("rpc delivery failed: {0}")]
    Rpc(String),
}

/// Failure that prevents the monitor from activating at all.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("rpc sink setup failed: {0}")]
    Rpc(String),
}
