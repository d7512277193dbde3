/// Boxed error produced by body writers and frame handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while reading, writing or handling frames.
///
/// Every variant except [`FrameError::Closed`] closes the connection it was
/// raised on.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header carries a mode ordinal outside the known set.
    #[error("invalid frame mode {0}")]
    InvalidMode(u16),

    /// A body writer produced more bytes than the header can describe.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// The byte channel failed.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A deferred body writer failed while serializing.
    #[error("body writer failed: {0}")]
    Body(#[source] BoxError),

    /// The layer above rejected an incoming frame.
    #[error("frame handler failed: {0}")]
    Handler(#[source] BoxError),

    /// The connection is already closed.
    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
