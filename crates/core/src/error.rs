/// Result alias that carries the custom [`LyricSyncError`] type.
pub type Result<T> = std::result::Result<T, LyricSyncError>;

/// Common error type for the core crate.
///
/// Line resolution and scroll arbitration never fail. Errors only come from
/// the edges: reading lyric or config files and talking to a driver whose
/// task has already stopped.
#[derive(Debug, thiserror::Error)]
pub enum LyricSyncError {
    /// Free-form error, e.g. a lyric file that is not text.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The configuration file could not be decoded.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// The sync driver task has shut down and no longer accepts commands.
    #[error("lyric sync driver has shut down")]
    DriverClosed,
}

impl LyricSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}
