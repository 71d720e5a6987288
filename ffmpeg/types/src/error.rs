use thiserror::Error;

/**
    Errors crossing the decode → convert → present boundary.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The decoder reported a corrupt or unreadable bitstream.
    #[error("decode error: {0}")]
    Decode(String),

    /// A frame's geometry is inconsistent with its declared format.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// No conversion path exists for the requested formats.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Pipeline settings are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The pipeline was shut down by its owner.
    #[error("pipeline cancelled")]
    Cancelled,

    /// The terminal signal of the pipeline was already delivered.
    #[error("pipeline closed")]
    Closed,
}

impl Error {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame(message.into())
    }

    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /**
        Returns true for errors that only affect a single frame. The
        pipeline drops that frame and keeps going.
    */
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidFrame(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
