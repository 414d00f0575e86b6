//! Error types for the compression core.

use std::io;
use thiserror::Error;

/// Error variants surfaced by the coders, models and methods.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied parameter is outside its contract.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The compressed stream cannot be decoded.
    #[error("corrupt stream: {0}")]
    CorruptStream(&'static str),

    /// An I/O error occurred while reading or writing a byte sink.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A specialized Result type for compression operations.
pub type Result<T> = std::result::Result<T, Error>;
