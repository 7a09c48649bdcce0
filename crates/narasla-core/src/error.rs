//! Error types shared by every narasla crate.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum NaraslaError {
    /// Gateway or network failure (transient).
    #[error("channel error: {0}")]
    Channel(String),

    /// Storage failure (transient).
    #[error("storage error: {0}")]
    Storage(String),

    /// The owner has nothing saved.
    #[error("storage: no saved pages")]
    NoSavedPages,

    #[error("storage: page not found")]
    PageNotFound,

    #[error("storage: user not found")]
    UserNotFound,

    /// The event kind is not one the processor handles.
    #[error("events: unknown event kind")]
    UnknownEventKind,

    /// The event metadata does not have the shape the processor expects.
    #[error("events: unrecognized metadata")]
    UnknownMeta,

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The shared shutdown signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A per-operation deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NaraslaError {
    /// True for shutdown and deadline errors. These are never retried and
    /// never reported as failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, NaraslaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_flavours() {
        assert!(NaraslaError::Cancelled.is_cancellation());
        assert!(NaraslaError::DeadlineExceeded.is_cancellation());
        assert!(!NaraslaError::NoSavedPages.is_cancellation());
        assert!(!NaraslaError::Channel("reset".into()).is_cancellation());
    }

    #[test]
    fn test_io_conversion() {
        let err: NaraslaError = std::io::Error::other("disk").into();
        assert!(matches!(err, NaraslaError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: disk");
    }
}
