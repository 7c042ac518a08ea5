// JSON encoding - one compact object per event

use crate::error::CodecError;
use crate::event::NormalizedEvent;

pub fn encode(event: &NormalizedEvent) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

pub fn decode(text: &str) -> Result<NormalizedEvent, CodecError> {
    Ok(serde_json::from_str(text.trim_end())?)
}
