//! In-memory two-slot flash backend.
//!
//! Mirrors the slot layout of a real OTA-capable device: two equally sized
//! application partitions (`ota_0`, `ota_1`) and a persisted boot selection.
//! Used by the test suites and host-side demos; committed images stay
//! inspectable through cloned handles.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::protocol::StorageError;
use crate::storage::{FirmwareStorage, FirmwareWriter, Partition, UpdateSize};

const SLOT_LABELS: [&str; 2] = ["ota_0", "ota_1"];

/// Default per-slot capacity, generous enough for any test image
const DEFAULT_SLOT_CAPACITY: usize = 4 * 1024 * 1024;

#[derive(Debug)]
struct Inner {
    images: [Vec<u8>; 2],
    boot: usize,
    slot_capacity: usize,
    begin_calls: usize,
    write_calls: usize,
}

/// A cloneable handle to a two-slot in-memory flash.
///
/// All clones share state, so a test can keep one handle for inspection
/// while the session under test owns another.
#[derive(Debug, Clone)]
pub struct MemFlash {
    inner: Arc<Mutex<Inner>>,
}

impl MemFlash {
    pub fn new() -> Self {
        Self::with_slot_capacity(DEFAULT_SLOT_CAPACITY)
    }

    /// A flash whose slots hold at most `slot_capacity` bytes; writes beyond
    /// that fail the same way a too-small physical partition would.
    pub fn with_slot_capacity(slot_capacity: usize) -> Self {
        let inner = Inner { images: [Vec::new(), Vec::new()], boot: 0, slot_capacity, begin_calls: 0, write_calls: 0 };
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    /// The committed image in the slot named `label`, if any.
    pub fn image(&self, label: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        let slot = slot_index(label)?;
        let image = &inner.images[slot];
        if image.is_empty() { None } else { Some(image.clone()) }
    }

    /// How many write sessions have been opened.
    pub fn begin_calls(&self) -> usize {
        self.inner.lock().unwrap().begin_calls
    }

    /// How many writes have been issued across all sessions.
    pub fn write_calls(&self) -> usize {
        self.inner.lock().unwrap().write_calls
    }
}

impl Default for MemFlash {
    fn default() -> Self {
        Self::new()
    }
}

fn slot_index(label: &str) -> Option<usize> {
    SLOT_LABELS.iter().position(|l| *l == label)
}

impl FirmwareStorage for MemFlash {
    type Writer = MemWriter;

    fn next_update_partition(&mut self) -> Result<Partition, StorageError> {
        let inner = self.inner.lock().unwrap();
        let next = 1 - inner.boot;
        Ok(Partition::new(SLOT_LABELS[next]))
    }

    fn begin(&mut self, target: &Partition, size: UpdateSize) -> Result<Self::Writer, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin_calls += 1;

        let slot = slot_index(target.label())
            .ok_or_else(|| StorageError::begin_failed(format!("unknown partition {target}")))?;

        if let UpdateSize::Exact(total) = size {
            if total > inner.slot_capacity as u64 {
                return Err(StorageError::begin_failed(format!(
                    "image of {total} bytes exceeds slot capacity {}",
                    inner.slot_capacity
                )));
            }
        }

        debug!(partition = %target, ?size, "opened in-memory write session");
        Ok(MemWriter { flash: Arc::clone(&self.inner), slot, staged: Vec::new() })
    }

    fn set_boot_partition(&mut self, target: &Partition) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let slot = slot_index(target.label())
            .ok_or_else(|| StorageError::set_boot_failed(format!("unknown partition {target}")))?;
        inner.boot = slot;
        Ok(())
    }

    fn boot_partition(&self) -> Result<Partition, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(Partition::new(SLOT_LABELS[inner.boot]))
    }
}

/// Write session against one in-memory slot.
///
/// Bytes are staged and only committed by [`finish`](FirmwareWriter::finish);
/// dropping the writer discards the staged image.
#[derive(Debug)]
pub struct MemWriter {
    flash: Arc<Mutex<Inner>>,
    slot: usize,
    staged: Vec<u8>,
}

impl FirmwareWriter for MemWriter {
    fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.flash.lock().unwrap();
        inner.write_calls += 1;

        if self.staged.len() + chunk.len() > inner.slot_capacity {
            return Err(StorageError::write_failed(format!(
                "write past slot capacity {}",
                inner.slot_capacity
            )));
        }
        self.staged.extend_from_slice(chunk);
        Ok(())
    }

    fn finish(self) -> Result<(), StorageError> {
        let mut inner = self.flash.lock().unwrap();
        let slot = self.slot;
        inner.images[slot] = self.staged;
        debug!(slot, bytes = inner.images[slot].len(), "committed in-memory image");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_commit() {
        let mut flash = MemFlash::new();
        let target = flash.next_update_partition().unwrap();
        assert_eq!(target.label(), "ota_1");

        let mut writer = flash.begin(&target, UpdateSize::Exact(6)).unwrap();
        writer.write(b"abc").unwrap();
        writer.write(b"def").unwrap();
        writer.finish().unwrap();

        assert_eq!(flash.image("ota_1").unwrap(), b"abcdef");
    }

    #[test]
    fn test_drop_discards_staged_bytes() {
        let mut flash = MemFlash::new();
        let target = flash.next_update_partition().unwrap();

        let mut writer = flash.begin(&target, UpdateSize::Unknown).unwrap();
        writer.write(b"half an image").unwrap();
        drop(writer);

        assert!(flash.image("ota_1").is_none());
    }

    #[test]
    fn test_boot_switch_flips_update_target() {
        let mut flash = MemFlash::new();
        assert_eq!(flash.boot_partition().unwrap().label(), "ota_0");

        let target = flash.next_update_partition().unwrap();
        flash.set_boot_partition(&target).unwrap();

        assert_eq!(flash.boot_partition().unwrap().label(), "ota_1");
        assert_eq!(flash.next_update_partition().unwrap().label(), "ota_0");
    }

    #[test]
    fn test_oversized_image_rejected_at_begin() {
        let mut flash = MemFlash::with_slot_capacity(16);
        let target = flash.next_update_partition().unwrap();

        let err = flash.begin(&target, UpdateSize::Exact(17)).unwrap_err();
        assert!(matches!(err, StorageError::BeginFailed { .. }));
    }

    #[test]
    fn test_write_past_capacity_fails() {
        let mut flash = MemFlash::with_slot_capacity(4);
        let target = flash.next_update_partition().unwrap();

        let mut writer = flash.begin(&target, UpdateSize::Unknown).unwrap();
        writer.write(b"1234").unwrap();
        let err = writer.write(b"5").unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed { .. }));
    }
}
