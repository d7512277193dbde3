use bytes::{Buf, BytesMut};
use packetwire_codec::ByteOrder;
use packetwire_transport::{ByteChannel, ReadOutcome};
use tracing::{debug, trace};

use crate::codec::{decode_header, Frame, FrameConfig, FrameHeader, HEADER_SIZE};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    AwaitingHeader,
    AwaitingBody(FrameHeader),
}

/// What a single [`FrameReader::step`] achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadProgress {
    /// At least one byte was taken from the channel.
    pub consumed: bool,
    /// The channel reported end-of-stream.
    pub end_of_stream: bool,
}

/// Incremental frame parser over a non-blocking channel.
///
/// Alternates between awaiting a 12-byte header and awaiting the body it
/// announces. Partial reads are buffered across steps, so frames come out
/// whole no matter how the channel splits the bytes.
#[derive(Debug)]
pub struct FrameReader {
    order: ByteOrder,
    capacity: usize,
    buf: Option<BytesMut>,
    state: ReadState,
}

impl FrameReader {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            order: config.byte_order,
            capacity: config.read_buffer_capacity.max(1),
            buf: None,
            state: ReadState::AwaitingHeader,
        }
    }

    /// True when no partial header or body is buffered.
    pub fn is_idle(&self) -> bool {
        self.state == ReadState::AwaitingHeader && self.buf.as_ref().is_none_or(|b| b.is_empty())
    }

    /// Read whatever the channel has and hand every completed frame to
    /// `on_frame`.
    ///
    /// Stops when the channel has nothing more right now, at end-of-stream,
    /// or when `should_stop` returns true after a delivered frame. Errors
    /// from the channel, the header, or `on_frame` are returned as-is.
    pub fn step<C, F, S>(
        &mut self,
        channel: &mut C,
        mut on_frame: F,
        mut should_stop: S,
    ) -> Result<ReadProgress>
    where
        C: ByteChannel + ?Sized,
        F: FnMut(Frame) -> Result<()>,
        S: FnMut() -> bool,
    {
        let capacity = self.capacity;
        let buf = self
            .buf
            .get_or_insert_with(|| BytesMut::with_capacity(capacity));
        let mut progress = ReadProgress::default();

        loop {
            while let Some(frame) = next_frame(&mut self.state, self.order, buf)? {
                trace!(
                    mode = %frame.mode,
                    packet_type = frame.packet_type,
                    request_id = frame.request_id,
                    body_size = frame.body.len(),
                    "frame received"
                );
                on_frame(frame)?;
                if should_stop() {
                    return Ok(progress);
                }
            }

            let missing = match self.state {
                ReadState::AwaitingHeader => HEADER_SIZE - buf.len(),
                ReadState::AwaitingBody(header) => usize::from(header.body_size) - buf.len(),
            };
            let start = buf.len();
            buf.resize(start + missing.max(capacity), 0);

            match channel.read(&mut buf[start..]) {
                Ok(ReadOutcome::Data(n)) => {
                    buf.truncate(start + n);
                    if n == 0 {
                        return Ok(progress);
                    }
                    progress.consumed = true;
                }
                Ok(ReadOutcome::EndOfStream) => {
                    buf.truncate(start);
                    if start > 0 || self.state != ReadState::AwaitingHeader {
                        debug!(buffered = start, "end of stream inside a partial frame");
                    }
                    progress.end_of_stream = true;
                    return Ok(progress);
                }
                Err(err) => {
                    buf.truncate(start);
                    return Err(err.into());
                }
            }
        }
    }
}

/// Advance the state machine over buffered bytes, yielding at most one frame.
fn next_frame(state: &mut ReadState, order: ByteOrder, buf: &mut BytesMut) -> Result<Option<Frame>> {
    loop {
        match *state {
            ReadState::AwaitingHeader => {
                if buf.len() < HEADER_SIZE {
                    return Ok(None);
                }
                let mut raw = [0u8; HEADER_SIZE];
                buf.copy_to_slice(&mut raw);
                *state = ReadState::AwaitingBody(decode_header(&raw, order)?);
            }
            ReadState::AwaitingBody(header) => {
                let size = usize::from(header.body_size);
                if buf.len() < size {
                    return Ok(None);
                }
                let body = buf.split_to(size).freeze();
                *state = ReadState::AwaitingHeader;
                return Ok(Some(Frame {
                    mode: header.mode,
                    packet_type: header.packet_type,
                    request_id: header.request_id,
                    body,
                }));
            }
        }
    }
}
