use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("buffer capacity must be positive")]
    ZeroCapacity,

    #[error("text of {len} bytes does not fit a buffer of capacity {capacity}")]
    TextTooLong { len: usize, capacity: usize },

    #[error("text contains an interior NUL at byte {0}")]
    InteriorNul(usize),

    #[error("buffer is not NUL-terminated")]
    Unterminated,

    #[error("buffer holds invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}
