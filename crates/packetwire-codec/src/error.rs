/// Errors that can occur while encoding or decoding a value.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The buffer ran out before the value was fully decoded.
    #[error("unexpected end of buffer (needed {needed} bytes, {remaining} remaining)")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// A negative value was handed to the unsigned variable-length encoder.
    #[error("value {0} is negative (encoding varuint)")]
    NegativeVarUint(i64),

    /// A variable-length integer did not terminate within 63 bits.
    #[error("varuint exceeds 63 bits")]
    VarUintOverflow,

    /// A decoded length prefix is negative or does not fit in memory.
    #[error("invalid length prefix: {0}")]
    InvalidLength(i128),

    /// A sequence is too long for the chosen length prefix codec.
    #[error("sequence of {0} elements does not fit the length prefix")]
    LengthOverflow(usize),

    /// A fixed-size sequence was given the wrong number of elements.
    #[error("fixed sequence expects {expected} elements, got {actual}")]
    SequenceLength { expected: usize, actual: usize },

    /// A string body is not valid UTF-8.
    #[error("invalid UTF-8 in string body")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A caller-supplied mapping or codec rejected the value.
    #[error("{0}")]
    Message(String),
}

impl CodecError {
    /// Build a free-form error, typically from inside a `try_map` closure.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
