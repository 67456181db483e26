// src/error.rs
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown encoding label: {label}")]
    UnknownEncoding { label: String },

    #[error("Encoding '{name}' is not ASCII-compatible; line breaks cannot be detected byte-wise")]
    UnsupportedEncoding { name: String },

    #[error("Stream already closed")]
    Closed,
}

impl From<ConsoleError> for std::io::Error {
    fn from(err: ConsoleError) -> Self {
        match err {
            ConsoleError::Io(e) => e,
            ConsoleError::Closed => std::io::Error::new(std::io::ErrorKind::BrokenPipe, err),
            other => std::io::Error::new(std::io::ErrorKind::InvalidInput, other),
        }
    }
}
