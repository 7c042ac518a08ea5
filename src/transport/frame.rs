// Frame codec for the local byte-stream transport
//
// Layout, all integers little endian:
//   [start marker u16 = 0xA0FF][payload length u32][end marker u16 = 0xA1FF][payload]

use bytes::{BufMut, BytesMut};
use std::io::{self, Read};

use super::TransportError;

pub const START_MARKER: u16 = 0xA0FF;
pub const END_MARKER: u16 = 0xA1FF;
pub const HEADER_LEN: usize = 8;

/// Largest payload a single frame may carry (4 MiB).
pub const MAX_PAYLOAD_LEN: usize = 4 * 1024 * 1024;

/// Write one frame into `buf`, replacing its previous contents.
pub fn encode_frame(payload: &[u8], buf: &mut BytesMut) -> Result<(), TransportError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(TransportError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    buf.clear();
    buf.reserve(HEADER_LEN + payload.len());
    buf.put_u16_le(START_MARKER);
    buf.put_u32_le(payload.len() as u32);
    buf.put_u16_le(END_MARKER);
    buf.put_slice(payload);
    Ok(())
}

/// Validate a frame header and return the payload length it declares.
pub fn parse_header(header: &[u8; HEADER_LEN]) -> Result<usize, TransportError> {
    let start = u16::from_le_bytes([header[0], header[1]]);
    let len = u32::from_le_bytes([header[2], header[3], header[4], header[5]]) as usize;
    let end = u16::from_le_bytes([header[6], header[7]]);

    if start != START_MARKER || end != END_MARKER {
        return Err(TransportError::InvalidFrame(format!(
            "bad markers {:#06x}/{:#06x}",
            start, end
        )));
    }

    if len > MAX_PAYLOAD_LEN {
        return Err(TransportError::PayloadTooLarge {
            len,
            max: MAX_PAYLOAD_LEN,
        });
    }

    Ok(len)
}

/// Split the first complete frame off `bytes`.
///
/// Returns the payload and the number of bytes consumed, or `None` if `bytes`
/// does not yet hold a whole frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Option<(&[u8], usize)>, TransportError> {
    let Some(header) = bytes.first_chunk::<HEADER_LEN>() else {
        return Ok(None);
    };

    let len = parse_header(header)?;
    let frame_len = HEADER_LEN + len;
    if bytes.len() < frame_len {
        return Ok(None);
    }

    Ok(Some((&bytes[HEADER_LEN..frame_len], frame_len)))
}

/// Read one frame from a stream. EOF on a frame boundary yields `None`.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(TransportError::InvalidFrame(format!(
                    "stream ended after {} header bytes",
                    filled
                )));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(TransportError::Io {
                    operation: "read",
                    source,
                });
            }
        }
    }

    let len = parse_header(&header)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|source| match source.kind() {
        io::ErrorKind::UnexpectedEof => {
            TransportError::InvalidFrame(format!("stream ended inside a {} byte payload", len))
        }
        _ => TransportError::Io {
            operation: "read",
            source,
        },
    })?;

    Ok(Some(payload))
}
