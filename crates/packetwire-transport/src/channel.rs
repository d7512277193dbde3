use std::io::{self, ErrorKind, Read, Write};

/// Result of a single non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were copied into the buffer. Zero means nothing is
    /// available right now; try again later.
    Data(usize),
    /// The peer closed its write side and every byte has been read.
    EndOfStream,
}

impl ReadOutcome {
    /// Number of bytes read, zero for end-of-stream.
    pub fn len(&self) -> usize {
        match self {
            ReadOutcome::Data(n) => *n,
            ReadOutcome::EndOfStream => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A bidirectional byte stream that never blocks.
///
/// Both methods return immediately. A read reports how many bytes were
/// transferred or that the stream ended; a write reports how many bytes were
/// accepted, possibly zero when the peer is not draining.
pub trait ByteChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<C: ByteChannel + ?Sized> ByteChannel for &mut C {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }
}

impl<C: ByteChannel + ?Sized> ByteChannel for Box<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }
}

/// Adapts a `Read + Write` stream in non-blocking mode to [`ByteChannel`].
///
/// `WouldBlock` becomes a zero-length transfer, `Interrupted` is retried and
/// a zero-length read is end-of-stream. The caller is responsible for putting
/// the underlying stream into non-blocking mode.
#[derive(Debug)]
pub struct NonBlocking<T> {
    inner: T,
}

impl<T> NonBlocking<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: Read + Write> ByteChannel for NonBlocking<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        if buf.is_empty() {
            return Ok(ReadOutcome::Data(0));
        }
        loop {
            return match self.inner.read(buf) {
                Ok(0) => Ok(ReadOutcome::EndOfStream),
                Ok(n) => Ok(ReadOutcome::Data(n)),
                Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(ReadOutcome::Data(0)),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            return match self.inner.write(buf) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted stream that replays a fixed list of read and write results.
    struct Script {
        reads: Vec<io::Result<Vec<u8>>>,
        writes: Vec<io::Result<usize>>,
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.remove(0) {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(e) => Err(e),
            }
        }
    }

    impl Write for Script {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            self.writes.remove(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn would_block_is_zero_and_eof_is_end_of_stream() {
        let mut channel = NonBlocking::new(Script {
            reads: vec![
                Err(ErrorKind::WouldBlock.into()),
                Ok(b"ab".to_vec()),
                Ok(Vec::new()),
            ],
            writes: Vec::new(),
        });
        let mut buf = [0u8; 8];

        assert_eq!(channel.read(&mut buf).unwrap(), ReadOutcome::Data(0));
        assert_eq!(channel.read(&mut buf).unwrap(), ReadOutcome::Data(2));
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(channel.read(&mut buf).unwrap(), ReadOutcome::EndOfStream);
    }

    #[test]
    fn interrupted_is_retried() {
        let mut channel = NonBlocking::new(Script {
            reads: vec![Err(ErrorKind::Interrupted.into()), Ok(b"x".to_vec())],
            writes: vec![Err(ErrorKind::Interrupted.into()), Ok(3)],
        });
        let mut buf = [0u8; 4];

        assert_eq!(channel.read(&mut buf).unwrap(), ReadOutcome::Data(1));
        assert_eq!(channel.write(b"xyz").unwrap(), 3);
    }

    #[test]
    fn write_would_block_is_zero() {
        let mut channel = NonBlocking::new(Script {
            reads: Vec::new(),
            writes: vec![Err(ErrorKind::WouldBlock.into())],
        });
        assert_eq!(channel.write(b"abc").unwrap(), 0);
    }

    #[test]
    fn other_errors_propagate() {
        let mut channel = NonBlocking::new(Script {
            reads: vec![Err(ErrorKind::ConnectionReset.into())],
            writes: vec![Err(ErrorKind::BrokenPipe.into())],
        });
        let mut buf = [0u8; 4];

        assert_eq!(
            channel.read(&mut buf).unwrap_err().kind(),
            ErrorKind::ConnectionReset
        );
        assert_eq!(
            channel.write(b"a").unwrap_err().kind(),
            ErrorKind::BrokenPipe
        );
    }
}
