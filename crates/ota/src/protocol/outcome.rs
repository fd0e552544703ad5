//! Terminal outcome of an update session.
//!
//! Every session ends in exactly one [`UpdateOutcome`], which is rendered to
//! the client by the outcome encoder before the device restarts. Failures
//! carry a stable numeric code so the short wire response stays parseable by
//! whatever tooling drove the upload.

/// The terminal state of one firmware transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The image was written, validated and selected as the next boot source.
    Succeeded {
        /// Label of the partition that will boot next
        label: String,
    },
    /// The transfer or the storage interaction failed.
    Failed {
        /// Stable numeric code, see [`code`]
        error_code: u32,
    },
}

impl UpdateOutcome {
    pub fn succeeded(label: impl Into<String>) -> Self {
        Self::Succeeded { label: label.into() }
    }

    pub fn failed(error_code: u32) -> Self {
        Self::Failed { error_code }
    }

    /// Returns true if the session reached `Succeeded`
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateOutcome::Succeeded { .. })
    }
}

/// Stable failure codes reported in the wire response.
///
/// Parse-level codes live in `0x01xx`, transport-level codes in `0x02xx`,
/// storage-level codes in `0x03xx`.
pub mod code {
    /// Preamble exceeded the size bound before the terminator was found
    pub const PREAMBLE_TOO_LARGE: u32 = 0x0101;
    /// No usable `Content-Length:` token in the preamble
    pub const CONTENT_LENGTH_MISSING: u32 = 0x0102;
    /// More payload bytes arrived than the preamble declared
    pub const OVERRUN: u32 = 0x0103;

    /// Peer closed the connection before the declared count was received
    pub const TRUNCATED: u32 = 0x0201;
    /// A single read exceeded the read timeout
    pub const READ_TIMEOUT: u32 = 0x0202;
    /// The transient read-error budget was exhausted
    pub const READ_FAILED: u32 = 0x0203;

    /// No inactive partition available to write into
    pub const NO_UPDATE_PARTITION: u32 = 0x0301;
    /// Opening the storage write session failed
    pub const STORAGE_BEGIN: u32 = 0x0302;
    /// Appending to the storage write session failed
    pub const STORAGE_WRITE: u32 = 0x0303;
    /// Closing or validating the completed image failed
    pub const STORAGE_FINALIZE: u32 = 0x0304;
    /// Marking the target as the next boot source failed
    pub const STORAGE_SET_BOOT: u32 = 0x0305;
}
