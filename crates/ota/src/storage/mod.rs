//! The storage capability consumed by an update session.
//!
//! The flash/partition subsystem is an external collaborator: this module
//! only defines the seam. A backend decides what "validate the image" means
//! and owns the persisted boot-partition selection; the session core never
//! sees more than the begin/write/finish/set-boot surface.
//!
//! [`MemFlash`] provides a two-slot in-memory backend used by tests and
//! host-side demos.

use std::fmt;

use crate::protocol::StorageError;

mod mem;
pub use mem::MemFlash;

/// Identifies one fixed region of persistent storage holding a firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    label: String,
}

impl Partition {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    /// The partition's label, e.g. `ota_0`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Size mode for a write session.
///
/// `Unknown` starts a streaming write where the total is only known at
/// finish time; `Exact` lets the backend pre-erase exactly the space it
/// needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSize {
    /// Streaming write, total size not known up front
    Unknown,
    /// The total image size in bytes
    Exact(u64),
}

/// A flash subsystem able to receive a firmware image.
///
/// Implementations are expected to expose (at least) two slots so that the
/// running image is never the write target.
pub trait FirmwareStorage {
    type Writer: FirmwareWriter;

    /// The inactive partition the next image should be written into.
    fn next_update_partition(&mut self) -> Result<Partition, StorageError>;

    /// Opens a write session against `target`.
    ///
    /// The returned writer owns the target exclusively until
    /// [`FirmwareWriter::finish`] or drop.
    fn begin(&mut self, target: &Partition, size: UpdateSize) -> Result<Self::Writer, StorageError>;

    /// Marks `target` as the source for the next boot.
    fn set_boot_partition(&mut self, target: &Partition) -> Result<(), StorageError>;

    /// The currently persisted boot selection.
    fn boot_partition(&self) -> Result<Partition, StorageError>;
}

/// An exclusive, sequential write session against one partition.
///
/// Dropping a writer without calling [`finish`](Self::finish) aborts the
/// staged write; nothing is committed and the partition keeps its previous
/// content.
pub trait FirmwareWriter {
    /// Appends `chunk` at the current write offset.
    fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError>;

    /// Closes the session, validating and committing the completed image.
    fn finish(self) -> Result<(), StorageError>;
}
