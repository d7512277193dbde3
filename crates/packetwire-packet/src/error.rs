use packetwire_codec::CodecError;
use packetwire_frame::FrameError;

/// Errors raised by registration, queuing and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The packet type id already belongs to another kind.
    #[error("packet type 0x{0:08x} is already registered")]
    DuplicateType(u32),

    /// The kind is already registered under another packet type id.
    #[error("packet kind {0} is already registered")]
    DuplicateKind(&'static str),

    /// The kind was never registered.
    #[error("packet kind {0} is not registered")]
    UnregisteredKind(&'static str),

    /// A packet body failed to decode.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(FrameError),
}

impl From<FrameError> for PacketError {
    fn from(err: FrameError) -> Self {
        // Decode failures travel through the frame layer boxed as handler errors.
        match err {
            FrameError::Handler(inner) => match inner.downcast::<CodecError>() {
                Ok(codec) => PacketError::Codec(*codec),
                Err(other) => PacketError::Frame(FrameError::Handler(other)),
            },
            other => PacketError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PacketError>;

/// Why an outgoing request did not produce a response packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The peer answered with a failure response.
    #[error("request rejected by peer: {0}")]
    Rejected(String),

    /// The connection closed before a response arrived.
    #[error("connection closed{}", describe_close(.remote, .reason))]
    Closed {
        remote: bool,
        reason: Option<String>,
    },

    /// The response decoded to a different kind than the caller expected.
    #[error("expected {expected} response, got {actual}")]
    UnexpectedKind {
        expected: &'static str,
        actual: &'static str,
    },
}

impl RequestError {
    /// True when the peer explicitly rejected the request.
    pub fn is_rejected(&self) -> bool {
        matches!(self, RequestError::Rejected(_))
    }
}

fn describe_close(remote: &bool, reason: &Option<String>) -> String {
    let side = if *remote { "by peer" } else { "locally" };
    match reason {
        Some(reason) => format!(" {side}: {reason}"),
        None => format!(" {side}"),
    }
}
