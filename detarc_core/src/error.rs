//! Error types for the transcoding pipeline and the array sink boundary.
//!
//! Container reading/writing and the filters report through `anyhow`; the
//! sink wraps those failures in [`SinkError::Backend`] without rewording them.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("input is empty")]
    EmptyFile,

    #[error("input length {length} is not a multiple of the {frame_size}-byte frame size")]
    MisalignedLength { length: u64, frame_size: usize },

    #[error("failed to read {len} bytes at offset {offset}: {source}")]
    Read {
        offset: u64,
        len: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to determine input length: {0}")]
    Stat(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl TranscodeError {
    /// True for the two input-shape errors that abort before any frame is read.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            TranscodeError::EmptyFile | TranscodeError::MisalignedLength { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("array does not match layout: {0}")]
    LayoutMismatch(String),

    #[error("array sink failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl SinkError {
    pub fn backend(err: anyhow::Error) -> Self {
        SinkError::Backend(err.into())
    }
}
