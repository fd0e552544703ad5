//! File-backed flash for host-side operation.
//!
//! Models a device's application flash as two slot files (`ota_0.bin`,
//! `ota_1.bin`) and a boot-marker file naming the slot the next start should
//! load. Images are staged in a scratch file and only renamed into place by
//! `finish`, so an aborted transfer never clobbers the previous image in the
//! slot.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info};

use micro_ota::protocol::StorageError;
use micro_ota::storage::{FirmwareStorage, FirmwareWriter, Partition, UpdateSize};

const SLOT_LABELS: [&str; 2] = ["ota_0", "ota_1"];

const BOOT_MARKER: &str = "boot";

/// Two slot files plus a persisted boot selection, rooted in one directory.
#[derive(Debug, Clone)]
pub struct FileFlash {
    dir: PathBuf,
}

impl FileFlash {
    /// Opens (creating if needed) the slot directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::begin_failed(format!("can't create slot directory {}: {e}", dir.display())))?;
        info!(dir = %dir.display(), "opened slot directory");
        Ok(Self { dir })
    }

    fn slot_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{label}.bin"))
    }

    fn staging_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{label}.staging"))
    }

    fn marker_path(&self) -> PathBuf {
        self.dir.join(BOOT_MARKER)
    }

    fn read_boot_label(&self) -> String {
        match fs::read_to_string(self.marker_path()) {
            Ok(label) if SLOT_LABELS.contains(&label.trim()) => label.trim().to_owned(),
            // a fresh or corrupt marker means the factory slot is running
            _ => SLOT_LABELS[0].to_owned(),
        }
    }
}

impl FirmwareStorage for FileFlash {
    type Writer = FileWriter;

    fn next_update_partition(&mut self) -> Result<Partition, StorageError> {
        let boot = self.read_boot_label();
        let next = SLOT_LABELS.iter().find(|l| **l != boot).ok_or(StorageError::NoUpdatePartition)?;
        Ok(Partition::new(*next))
    }

    fn begin(&mut self, target: &Partition, size: UpdateSize) -> Result<Self::Writer, StorageError> {
        if !SLOT_LABELS.contains(&target.label()) {
            return Err(StorageError::begin_failed(format!("unknown partition {target}")));
        }

        let staging = self.staging_path(target.label());
        let file = File::create(&staging)
            .map_err(|e| StorageError::begin_failed(format!("can't create {}: {e}", staging.display())))?;

        debug!(partition = %target, ?size, staging = %staging.display(), "opened slot write session");
        Ok(FileWriter { file: Some(file), staging, committed_path: self.slot_path(target.label()), written: 0 })
    }

    fn set_boot_partition(&mut self, target: &Partition) -> Result<(), StorageError> {
        if !SLOT_LABELS.contains(&target.label()) {
            return Err(StorageError::set_boot_failed(format!("unknown partition {target}")));
        }
        fs::write(self.marker_path(), target.label())
            .map_err(|e| StorageError::set_boot_failed(format!("can't persist boot marker: {e}")))
    }

    fn boot_partition(&self) -> Result<Partition, StorageError> {
        Ok(Partition::new(self.read_boot_label()))
    }
}

/// Write session staging one image file.
#[derive(Debug)]
pub struct FileWriter {
    file: Option<File>,
    staging: PathBuf,
    committed_path: PathBuf,
    written: u64,
}

impl FirmwareWriter for FileWriter {
    fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let file = self.file.as_mut().ok_or_else(|| StorageError::write_failed("write session already closed"))?;
        file.write_all(chunk).map_err(|e| StorageError::write_failed(e.to_string()))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    fn finish(mut self) -> Result<(), StorageError> {
        // errors below return with `file` still held, so Drop discards the
        // staged bytes
        let file = self.file.as_mut().ok_or_else(|| StorageError::finalize_failed("write session already closed"))?;

        // a zero-byte firmware image is never bootable
        if self.written == 0 {
            return Err(StorageError::finalize_failed("received 0 bytes"));
        }

        file.sync_all().map_err(|e| StorageError::finalize_failed(e.to_string()))?;
        self.file = None;

        if let Err(e) = fs::rename(&self.staging, &self.committed_path) {
            let _ = fs::remove_file(&self.staging);
            return Err(StorageError::finalize_failed(e.to_string()));
        }
        debug!(image = %self.committed_path.display(), bytes = self.written, "committed image");
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        // abort path: discard the staged bytes
        if self.file.take().is_some() {
            let _ = fs::remove_file(&self.staging);
        }
    }
}
