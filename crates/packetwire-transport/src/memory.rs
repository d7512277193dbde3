//! In-memory full-duplex channel.
//!
//! [`duplex`] returns two connected ends. Bytes written to one end become
//! readable at the other. Reads and writes can be capped per call to exercise
//! partial transfers the way a real socket produces them.

use std::io::{self, ErrorKind};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use parking_lot::Mutex;
use tracing::trace;

use crate::channel::{ByteChannel, ReadOutcome};

#[derive(Debug, Default)]
struct PipeState {
    buf: BytesMut,
    /// No more bytes will be written; the reader sees end-of-stream once drained.
    writer_closed: bool,
    /// The reading end is gone; further writes fail.
    reader_closed: bool,
}

type Pipe = Arc<Mutex<PipeState>>;

/// One end of an in-memory duplex channel.
#[derive(Debug)]
pub struct MemoryChannel {
    incoming: Pipe,
    outgoing: Pipe,
    read_chunk: Option<usize>,
    write_chunk: Option<usize>,
}

/// Create a connected pair of in-memory channels.
pub fn duplex() -> (MemoryChannel, MemoryChannel) {
    let a_to_b: Pipe = Arc::default();
    let b_to_a: Pipe = Arc::default();
    let a = MemoryChannel::new(Arc::clone(&b_to_a), Arc::clone(&a_to_b));
    let b = MemoryChannel::new(a_to_b, b_to_a);
    (a, b)
}

impl MemoryChannel {
    fn new(incoming: Pipe, outgoing: Pipe) -> Self {
        Self {
            incoming,
            outgoing,
            read_chunk: None,
            write_chunk: None,
        }
    }

    /// Return at most `chunk` bytes from each read.
    pub fn with_read_chunk(mut self, chunk: usize) -> Self {
        self.read_chunk = Some(chunk.max(1));
        self
    }

    /// Accept at most `chunk` bytes per write.
    pub fn with_write_chunk(mut self, chunk: usize) -> Self {
        self.write_chunk = Some(chunk.max(1));
        self
    }

    /// Close the write direction. The peer reads what is buffered, then
    /// end-of-stream. Reading from this end keeps working.
    pub fn shutdown(&self) {
        self.outgoing.lock().writer_closed = true;
    }

    /// Bytes written by the peer and not yet read by this end.
    pub fn available(&self) -> usize {
        self.incoming.lock().buf.len()
    }
}

impl ByteChannel for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let mut pipe = self.incoming.lock();
        if pipe.buf.is_empty() {
            return Ok(if pipe.writer_closed {
                ReadOutcome::EndOfStream
            } else {
                ReadOutcome::Data(0)
            });
        }

        let mut n = buf.len().min(pipe.buf.len());
        if let Some(chunk) = self.read_chunk {
            n = n.min(chunk);
        }
        buf[..n].copy_from_slice(&pipe.buf[..n]);
        pipe.buf.advance(n);
        trace!(bytes = n, "memory channel read");
        Ok(ReadOutcome::Data(n))
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut pipe = self.outgoing.lock();
        if pipe.writer_closed {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "channel shut down"));
        }
        if pipe.reader_closed {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "peer dropped"));
        }

        let n = self.write_chunk.map_or(buf.len(), |chunk| buf.len().min(chunk));
        pipe.buf.extend_from_slice(&buf[..n]);
        trace!(bytes = n, "memory channel write");
        Ok(n)
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.outgoing.lock().writer_closed = true;
        self.incoming.lock().reader_closed = true;
    }
}
