// Codec module - wire encodings for normalized events

pub mod binary;
pub mod json;
pub mod xml;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;
use crate::event::NormalizedEvent;

/// Wire representation chosen once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Compact single-line JSON
    #[default]
    Json,
    /// Single-line markup tree
    Xml,
    /// Protobuf record
    Binary,
}

impl WireFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireFormat::Json => "json",
            WireFormat::Xml => "xml",
            WireFormat::Binary => "binary",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            "binary" | "protobuf" => Ok(Self::Binary),
            other => Err(format!("unknown wire format '{}'", other)),
        }
    }
}

/// One event encoded for delivery. Every sink receives the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Text(String),
    Binary(Vec<u8>),
}

impl Encoded {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Encoded::Text(text) => text.as_bytes(),
            Encoded::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Encoded::Text(text) => Some(text),
            Encoded::Binary(_) => None,
        }
    }
}

/// Encode an event in the given format.
pub fn encode(event: &NormalizedEvent, format: WireFormat) -> Result<Encoded, CodecError> {
    match format {
        WireFormat::Json => json::encode(event).map(Encoded::Text),
        WireFormat::Xml => Ok(Encoded::Text(xml::encode(event))),
        WireFormat::Binary => Ok(Encoded::Binary(binary::encode(event))),
    }
}

/// Decode a payload produced by [`encode`]. The markup format is display-only.
pub fn decode(payload: &[u8], format: WireFormat) -> Result<NormalizedEvent, CodecError> {
    match format {
        WireFormat::Json => json::decode(std::str::from_utf8(payload)?),
        WireFormat::Xml => Err(CodecError::Unsupported { format: "xml" }),
        WireFormat::Binary => binary::decode(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn test_wire_format_from_str() {
        assert_eq!("JSON".parse::<WireFormat>(), Ok(WireFormat::Json));
        assert_eq!("protobuf".parse::<WireFormat>(), Ok(WireFormat::Binary));
        assert!("yaml".parse::<WireFormat>().is_err());
    }

    #[test]
    fn test_text_formats_yield_text() {
        let event = NormalizedEvent::new(EventKind::StartTest);
        for format in [WireFormat::Json, WireFormat::Xml] {
            let encoded = encode(&event, format).expect("encode");
            assert!(encoded.as_text().is_some(), "{} should be text", format);
            assert_eq!(encoded.len(), encoded.as_text().map(str::len).unwrap_or(0));
        }

        let encoded = encode(&event, WireFormat::Binary).expect("encode");
        assert!(matches!(encoded, Encoded::Binary(_)));
    }

    #[test]
    fn test_xml_decode_is_unsupported() {
        let result = decode(b"<Event/>", WireFormat::Xml);
        assert!(matches!(result, Err(CodecError::Unsupported { .. })));
    }
}
