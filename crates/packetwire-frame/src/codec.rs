use bytes::{Buf, BufMut, Bytes, BytesMut};
use packetwire_codec::ByteOrder;

use crate::error::{FrameError, Result};
use crate::mode::Mode;

/// Frame header: mode (2) + body size (2) + packet type (4) + request id (4).
pub const HEADER_SIZE: usize = 12;

/// Largest body the 16-bit size field can describe.
pub const MAX_BODY_SIZE: usize = u16::MAX as usize;

/// Offset of the body size field within the header.
pub(crate) const BODY_SIZE_OFFSET: usize = 2;

const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub mode: Mode,
    pub body_size: u16,
    pub packet_type: u32,
    pub request_id: u32,
}

/// A complete frame as delivered to the layer above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub mode: Mode,
    pub packet_type: u32,
    /// Correlates a request with its response. Zero for notifications.
    pub request_id: u32,
    pub body: Bytes,
}

impl Frame {
    pub fn new(mode: Mode, packet_type: u32, request_id: u32, body: impl Into<Bytes>) -> Self {
        Self {
            mode,
            packet_type,
            request_id,
            body: body.into(),
        }
    }
}

/// Encode a complete frame in one pass. Connections serialize through
/// [`FrameWriter`](crate::writer::FrameWriter) instead; this builds expected
/// wire bytes for tests.
///
/// Wire format, every integer in the connection's byte order:
/// ```text
/// ┌──────────┬───────────┬─────────────┬─────────────┬──────────────────┐
/// │ Mode     │ Body size │ Packet type │ Request id  │ Body             │
/// │ (u16)    │ (u16)     │ (u32)       │ (u32)       │ (body size bytes)│
/// └──────────┴───────────┴─────────────┴─────────────┴──────────────────┘
/// ```
#[cfg(test)]
pub(crate) fn encode_frame(frame: &Frame, order: ByteOrder, dst: &mut BytesMut) -> Result<()> {
    let size = check_body_size(frame.body.len())?;
    dst.reserve(HEADER_SIZE + frame.body.len());
    put_header(
        dst,
        &FrameHeader {
            mode: frame.mode,
            body_size: size,
            packet_type: frame.packet_type,
            request_id: frame.request_id,
        },
        order,
    );
    dst.put_slice(&frame.body);
    Ok(())
}

/// Decode a header. Fails only on an unknown mode ordinal.
pub fn decode_header(header: &[u8; HEADER_SIZE], order: ByteOrder) -> Result<FrameHeader> {
    let mut src = &header[..];
    let (mode, body_size, packet_type, request_id) = match order {
        ByteOrder::Big => (src.get_u16(), src.get_u16(), src.get_u32(), src.get_u32()),
        ByteOrder::Little => (
            src.get_u16_le(),
            src.get_u16_le(),
            src.get_u32_le(),
            src.get_u32_le(),
        ),
    };
    Ok(FrameHeader {
        mode: Mode::from_wire(mode)?,
        body_size,
        packet_type,
        request_id,
    })
}

pub(crate) fn put_header(dst: &mut BytesMut, header: &FrameHeader, order: ByteOrder) {
    match order {
        ByteOrder::Big => {
            dst.put_u16(header.mode.as_wire());
            dst.put_u16(header.body_size);
            dst.put_u32(header.packet_type);
            dst.put_u32(header.request_id);
        }
        ByteOrder::Little => {
            dst.put_u16_le(header.mode.as_wire());
            dst.put_u16_le(header.body_size);
            dst.put_u32_le(header.packet_type);
            dst.put_u32_le(header.request_id);
        }
    }
}

pub(crate) fn body_size_bytes(size: u16, order: ByteOrder) -> [u8; 2] {
    match order {
        ByteOrder::Big => size.to_be_bytes(),
        ByteOrder::Little => size.to_le_bytes(),
    }
}

pub(crate) fn check_body_size(size: usize) -> Result<u16> {
    u16::try_from(size).map_err(|_| FrameError::BodyTooLarge {
        size,
        max: MAX_BODY_SIZE,
    })
}

/// Per-connection buffer configuration.
///
/// Buffers are allocated with these capacities on the first read or write
/// step of each direction, so idle directions cost nothing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Byte order for the header and for every body integer that does not
    /// pin its own.
    pub byte_order: ByteOrder,
    /// Initial read buffer size and the most bytes requested per channel read.
    pub read_buffer_capacity: usize,
    /// Initial write buffer size.
    pub write_buffer_capacity: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Big,
            read_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            write_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}
