use std::io;
use thiserror::Error;

use crate::protocol::code;

#[derive(Debug, Error)]
pub enum OtaError {
    #[error("request error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("storage error: {source}")]
    Storage {
        #[from]
        source: StorageError,
    },

    #[error("response error: {source}")]
    Response {
        #[from]
        source: SendError,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("preamble size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargePreamble { current_size: usize, max_size: usize },

    #[error("content-length missing or malformed: {reason}")]
    ContentLengthMissing { reason: String },

    #[error("payload overrun: {declared} bytes declared, at least {excess} surplus")]
    Overrun { declared: u64, excess: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_preamble(current_size: usize, max_size: usize) -> Self {
        Self::TooLargePreamble { current_size, max_size }
    }

    pub fn content_length_missing<S: ToString>(str: S) -> Self {
        Self::ContentLengthMissing { reason: str.to_string() }
    }

    pub fn overrun(declared: u64, excess: usize) -> Self {
        Self::Overrun { declared, excess }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The numeric code reported in a failure response.
    pub fn code(&self) -> u32 {
        match self {
            Self::TooLargePreamble { .. } => code::PREAMBLE_TOO_LARGE,
            Self::ContentLengthMissing { .. } => code::CONTENT_LENGTH_MISSING,
            Self::Overrun { .. } => code::OVERRUN,
            Self::Io { .. } => code::READ_FAILED,
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no update partition available")]
    NoUpdatePartition,

    #[error("begin write session failed: {reason}")]
    BeginFailed { reason: String },

    #[error("write failed: {reason}")]
    WriteFailed { reason: String },

    #[error("finalize failed: {reason}")]
    FinalizeFailed { reason: String },

    #[error("set boot partition failed: {reason}")]
    SetBootFailed { reason: String },
}

impl StorageError {
    pub fn begin_failed<S: ToString>(str: S) -> Self {
        Self::BeginFailed { reason: str.to_string() }
    }

    pub fn write_failed<S: ToString>(str: S) -> Self {
        Self::WriteFailed { reason: str.to_string() }
    }

    pub fn finalize_failed<S: ToString>(str: S) -> Self {
        Self::FinalizeFailed { reason: str.to_string() }
    }

    pub fn set_boot_failed<S: ToString>(str: S) -> Self {
        Self::SetBootFailed { reason: str.to_string() }
    }

    /// The numeric code reported in a failure response.
    pub fn code(&self) -> u32 {
        match self {
            Self::NoUpdatePartition => code::NO_UPDATE_PARTITION,
            Self::BeginFailed { .. } => code::STORAGE_BEGIN,
            Self::WriteFailed { .. } => code::STORAGE_WRITE,
            Self::FinalizeFailed { .. } => code::STORAGE_FINALIZE,
            Self::SetBootFailed { .. } => code::STORAGE_SET_BOOT,
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
