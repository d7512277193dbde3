use std::fmt;

use bytes::{Buf, Bytes, BytesMut};
use packetwire_codec::ByteOrder;
use packetwire_transport::ByteChannel;
use tracing::trace;

use crate::codec::{
    body_size_bytes, check_body_size, put_header, FrameConfig, FrameHeader, BODY_SIZE_OFFSET,
};
use crate::error::{BoxError, FrameError, Result};
use crate::mode::Mode;

/// Deferred body serializer, run when the frame reaches the write buffer.
pub type BodyWriter = Box<dyn FnOnce(&mut BytesMut) -> std::result::Result<(), BoxError> + Send>;

/// A frame waiting in the outgoing queue.
pub struct OutgoingFrame {
    pub mode: Mode,
    pub packet_type: u32,
    pub request_id: u32,
    pub body: BodyWriter,
}

impl OutgoingFrame {
    pub fn new<W>(mode: Mode, packet_type: u32, request_id: u32, body: W) -> Self
    where
        W: FnOnce(&mut BytesMut) -> std::result::Result<(), BoxError> + Send + 'static,
    {
        Self {
            mode,
            packet_type,
            request_id,
            body: Box::new(body),
        }
    }

    /// Frame whose body is already serialized.
    pub fn with_body(mode: Mode, packet_type: u32, request_id: u32, body: Bytes) -> Self {
        Self::new(mode, packet_type, request_id, move |dst: &mut BytesMut| {
            dst.extend_from_slice(&body);
            Ok(())
        })
    }
}

impl fmt::Debug for OutgoingFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingFrame")
            .field("mode", &self.mode)
            .field("packet_type", &self.packet_type)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Serializes queued frames and flushes them to a non-blocking channel.
///
/// Bytes the channel does not accept stay buffered for the next step. A
/// queued frame is only serialized once the previous one is fully flushed.
#[derive(Debug)]
pub struct FrameWriter {
    order: ByteOrder,
    capacity: usize,
    buf: Option<BytesMut>,
}

impl FrameWriter {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            order: config.byte_order,
            capacity: config.write_buffer_capacity,
            buf: None,
        }
    }

    /// Bytes serialized but not yet accepted by the channel.
    pub fn pending_bytes(&self) -> usize {
        self.buf.as_ref().map_or(0, BytesMut::len)
    }

    /// Flush buffered bytes, then pull frames from `next` until the channel
    /// stops accepting, `next` runs dry, or `should_stop` returns true.
    ///
    /// Returns whether any byte was written.
    pub fn step<C, N, S>(&mut self, channel: &mut C, mut next: N, mut should_stop: S) -> Result<bool>
    where
        C: ByteChannel + ?Sized,
        N: FnMut() -> Option<OutgoingFrame>,
        S: FnMut() -> bool,
    {
        let capacity = self.capacity;
        let buf = self
            .buf
            .get_or_insert_with(|| BytesMut::with_capacity(capacity));
        let mut wrote = false;

        loop {
            if should_stop() {
                return Ok(wrote);
            }

            if !buf.is_empty() {
                let n = channel.write(&buf[..])?;
                if n == 0 {
                    return Ok(wrote);
                }
                buf.advance(n.min(buf.len()));
                wrote = true;
                continue;
            }

            let Some(frame) = next() else {
                return Ok(wrote);
            };
            serialize(buf, frame, self.order)?;
        }
    }
}

/// Write the header with a placeholder size, run the body writer, then
/// patch the size. On failure the buffer is left as it was.
fn serialize(buf: &mut BytesMut, frame: OutgoingFrame, order: ByteOrder) -> Result<()> {
    let start = buf.len();
    put_header(
        buf,
        &FrameHeader {
            mode: frame.mode,
            body_size: 0,
            packet_type: frame.packet_type,
            request_id: frame.request_id,
        },
        order,
    );
    let body_start = buf.len();

    if let Err(err) = (frame.body)(buf) {
        buf.truncate(start);
        return Err(FrameError::Body(err));
    }
    let size = match check_body_size(buf.len() - body_start) {
        Ok(size) => size,
        Err(err) => {
            buf.truncate(start);
            return Err(err);
        }
    };

    let at = start + BODY_SIZE_OFFSET;
    buf[at..at + 2].copy_from_slice(&body_size_bytes(size, order));
    trace!(
        mode = %frame.mode,
        packet_type = frame.packet_type,
        request_id = frame.request_id,
        body_size = size,
        "frame serialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use packetwire_transport::{duplex, ReadOutcome};

    use super::*;
    use crate::codec::{decode_header, Frame, HEADER_SIZE, MAX_BODY_SIZE};

    fn drain(channel: &mut packetwire_transport::MemoryChannel) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        while let ReadOutcome::Data(n) = channel.read(&mut buf).unwrap() {
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn body_size_is_back_patched() {
        let (mut tx, mut rx) = duplex();
        let mut writer = FrameWriter::new(&FrameConfig::default());
        let mut queue = VecDeque::from([OutgoingFrame::new(Mode::Notify, 5, 0, |dst: &mut BytesMut| {
            dst.extend_from_slice(b"hello world");
            Ok(())
        })]);

        assert!(writer.step(&mut tx, || queue.pop_front(), || false).unwrap());

        let wire = drain(&mut rx);
        let header = decode_header(&wire[..HEADER_SIZE].try_into().unwrap(), ByteOrder::Big).unwrap();
        assert_eq!(header.body_size, 11);
        assert_eq!(header.packet_type, 5);
        assert_eq!(&wire[HEADER_SIZE..], b"hello world");
    }

    #[test]
    fn partial_writes_resume_on_next_step() {
        let (tx, mut rx) = duplex();
        let mut tx = tx.with_write_chunk(5);
        let mut writer = FrameWriter::new(&FrameConfig::default());
        let frame = Frame::new(Mode::Request, 1, 42, vec![7u8; 40]);
        let mut queue = VecDeque::from([OutgoingFrame::with_body(
            frame.mode,
            frame.packet_type,
            frame.request_id,
            frame.body.clone(),
        )]);

        // A chunked channel still accepts everything in one step, five bytes at a time.
        assert!(writer.step(&mut tx, || queue.pop_front(), || false).unwrap());
        assert_eq!(writer.pending_bytes(), 0);

        let mut expected = BytesMut::new();
        crate::codec::encode_frame(&frame, ByteOrder::Big, &mut expected).unwrap();
        assert_eq!(drain(&mut rx), expected.to_vec());
    }

    /// Channel that accepts a fixed budget of bytes, then reports zero.
    struct Throttled {
        budget: usize,
        written: Vec<u8>,
    }

    impl ByteChannel for Throttled {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<ReadOutcome> {
            Ok(ReadOutcome::Data(0))
        }

        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }
    }

    #[test]
    fn zero_accepted_is_not_an_error() {
        let mut channel = Throttled {
            budget: 7,
            written: Vec::new(),
        };
        let mut writer = FrameWriter::new(&FrameConfig::default());
        let mut queue = VecDeque::from([
            OutgoingFrame::with_body(Mode::Notify, 1, 0, Bytes::from_static(b"first")),
            OutgoingFrame::with_body(Mode::Notify, 2, 0, Bytes::from_static(b"second")),
        ]);

        assert!(writer.step(&mut channel, || queue.pop_front(), || false).unwrap());
        assert_eq!(channel.written.len(), 7);
        assert_eq!(writer.pending_bytes(), HEADER_SIZE + 5 - 7);
        assert_eq!(queue.len(), 1, "second frame waits for the first to flush");

        assert!(!writer.step(&mut channel, || queue.pop_front(), || false).unwrap());

        channel.budget = usize::MAX;
        assert!(writer.step(&mut channel, || queue.pop_front(), || false).unwrap());
        assert_eq!(channel.written.len(), 2 * HEADER_SIZE + 11);
        assert!(queue.is_empty());
    }

    #[test]
    fn oversized_body_fails() {
        let (mut tx, mut rx) = duplex();
        let mut writer = FrameWriter::new(&FrameConfig::default());
        let mut queue = VecDeque::from([OutgoingFrame::new(Mode::Notify, 1, 0, |dst: &mut BytesMut| {
            dst.extend_from_slice(&vec![0u8; MAX_BODY_SIZE + 1]);
            Ok(())
        })]);

        let err = writer.step(&mut tx, || queue.pop_front(), || false).unwrap_err();
        assert!(matches!(err, FrameError::BodyTooLarge { size: 65536, .. }));
        assert_eq!(writer.pending_bytes(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn body_writer_error_is_reported() {
        let (mut tx, _rx) = duplex();
        let mut writer = FrameWriter::new(&FrameConfig::default());
        let mut queue = VecDeque::from([OutgoingFrame::new(Mode::Notify, 1, 0, |_: &mut BytesMut| {
            Err("cannot encode".into())
        })]);

        let err = writer.step(&mut tx, || queue.pop_front(), || false).unwrap_err();
        assert!(matches!(err, FrameError::Body(_)));
        assert_eq!(err.to_string(), "body writer failed: cannot encode");
    }

    #[test]
    fn empty_queue_writes_nothing() {
        let (mut tx, _rx) = duplex();
        let mut writer = FrameWriter::new(&FrameConfig::default());
        assert!(!writer.step(&mut tx, || None, || false).unwrap());
    }
}
