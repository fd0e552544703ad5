//! One in-progress firmware transfer.
//!
//! An [`UpdateSession`] owns the write handle into the inactive partition and
//! tracks expected-vs-received byte counts. It is created when a connection
//! is accepted, driven to a terminal state by the connection loop, and never
//! reused: a fresh connection constructs a fresh session.
//!
//! # State machine
//!
//! ```text
//! Idle -> ParsingHeader -> Streaming -> Finalizing -> Succeeded
//!                                                  \-> Failed
//! ```
//!
//! `ParsingHeader -> Streaming` happens only once the declared length is
//! known; `Streaming -> Finalizing` only when `received == expected`. Any
//! storage failure at any point transitions directly to `Failed`. Both
//! terminal states release the write handle before the caller can restart
//! the device.

use tracing::{error, info};

use crate::protocol::{StorageError, UpdateOutcome};
use crate::storage::{FirmwareStorage, FirmwareWriter, Partition, UpdateSize};

/// Lifecycle states of an update session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing received yet
    Idle,
    /// Reading the request preamble
    ParsingHeader,
    /// Writing payload bytes into the inactive partition
    Streaming,
    /// Declared count satisfied, validating and activating the image
    Finalizing,
    /// Terminal: the image was activated
    Succeeded,
    /// Terminal: the transfer or a storage interaction failed
    Failed,
}

/// Represents one in-progress firmware transfer.
///
/// Owns the storage capability and, between [`begin`](Self::begin) and
/// [`finalize`](Self::finalize), the exclusive write handle into the target
/// partition.
pub struct UpdateSession<S: FirmwareStorage> {
    storage: S,
    target: Partition,
    writer: Option<S::Writer>,
    expected: Option<u64>,
    received: u64,
    state: SessionState,
}

impl<S: FirmwareStorage> UpdateSession<S> {
    /// Creates a session targeting the inactive partition.
    pub fn new(mut storage: S) -> Result<Self, StorageError> {
        let target = storage.next_update_partition()?;
        Ok(Self { storage, target, writer: None, expected: None, received: 0, state: SessionState::Idle })
    }

    /// Marks the session as parsing the request preamble.
    pub fn start(&mut self) {
        info!(partition = %self.target, "writing update to partition");
        self.state = SessionState::ParsingHeader;
    }

    /// Opens the storage write session once the declared length is known.
    ///
    /// Transitions `ParsingHeader -> Streaming`. On error the caller is
    /// expected to route the storage error code through [`fail`](Self::fail).
    pub fn begin(&mut self, content_length: u64) -> Result<(), StorageError> {
        info!(content_length, "detected content length");
        let writer = self.storage.begin(&self.target, UpdateSize::Exact(content_length))?;
        self.writer = Some(writer);
        self.expected = Some(content_length);
        self.state = SessionState::Streaming;
        Ok(())
    }

    /// Appends payload bytes sequentially.
    ///
    /// Must only be called while `Streaming`; the decoder guarantees the
    /// declared length is never exceeded.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        debug_assert_eq!(self.state, SessionState::Streaming);
        if let Some(expected) = self.expected {
            debug_assert!(self.received + chunk.len() as u64 <= expected);
        }

        let writer = self.writer.as_mut().ok_or_else(|| StorageError::write_failed("no open write session"))?;
        writer.write(chunk)?;
        self.received += chunk.len() as u64;
        Ok(())
    }

    /// True exactly when every declared byte has been received.
    pub fn is_complete(&self) -> bool {
        self.expected.is_some_and(|expected| self.received == expected)
    }

    /// Closes the write session, validates the image and switches the boot
    /// target.
    ///
    /// Transitions `Streaming -> Finalizing -> {Succeeded, Failed}`.
    pub fn finalize(&mut self) -> UpdateOutcome {
        self.state = SessionState::Finalizing;
        info!(bytes = self.received, "binary transfer finished");

        let result = self
            .writer
            .take()
            .ok_or_else(|| StorageError::finalize_failed("no open write session"))
            .and_then(FirmwareWriter::finish)
            .and_then(|()| self.storage.set_boot_partition(&self.target));

        match result {
            Ok(()) => {
                info!(partition = %self.target, "update image activated");
                self.state = SessionState::Succeeded;
                UpdateOutcome::succeeded(self.target.label())
            }
            Err(e) => {
                error!(cause = %e, "finalize failed");
                self.state = SessionState::Failed;
                UpdateOutcome::failed(e.code())
            }
        }
    }

    /// Aborts the session with `error_code`.
    ///
    /// Releases the write handle; staged bytes are discarded by the storage
    /// backend. Valid from any non-terminal state.
    pub fn fail(&mut self, error_code: u32) -> UpdateOutcome {
        self.writer.take();
        self.state = SessionState::Failed;
        UpdateOutcome::failed(error_code)
    }

    /// The session's current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Payload bytes written so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// The declared payload size, once parsed.
    pub fn expected(&self) -> Option<u64> {
        self.expected
    }

    /// The partition this session writes into.
    pub fn target(&self) -> &Partition {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::code;
    use crate::storage::MemFlash;

    fn streaming_session(flash: &MemFlash, content_length: u64) -> UpdateSession<MemFlash> {
        let mut session = UpdateSession::new(flash.clone()).unwrap();
        session.start();
        session.begin(content_length).unwrap();
        session
    }

    #[test]
    fn test_lifecycle_states() {
        let flash = MemFlash::new();
        let mut session = UpdateSession::new(flash).unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        session.start();
        assert_eq!(session.state(), SessionState::ParsingHeader);

        session.begin(4).unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.expected(), Some(4));

        session.write(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert!(session.is_complete());

        let outcome = session.finalize();
        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(outcome, UpdateOutcome::succeeded("ota_1"));
    }

    #[test]
    fn test_storage_receives_exact_chunk_concatenation() {
        let flash = MemFlash::new();
        let mut session = streaming_session(&flash, 11);

        session.write(b"first").unwrap();
        session.write(b"").unwrap();
        session.write(b"second").unwrap();
        assert_eq!(session.received(), 11);

        let outcome = session.finalize();
        assert!(outcome.is_success());
        assert_eq!(flash.image("ota_1").unwrap(), b"firstsecond");
    }

    #[test]
    fn test_finalize_switches_boot_target() {
        let flash = MemFlash::new();
        let mut session = streaming_session(&flash, 2);
        session.write(b"ab").unwrap();
        session.finalize();

        assert_eq!(flash.boot_partition().unwrap().label(), "ota_1");
    }

    #[test]
    fn test_zero_length_transfer_finalizes_without_writes() {
        let flash = MemFlash::new();
        let mut session = streaming_session(&flash, 0);

        assert!(session.is_complete());
        let outcome = session.finalize();

        assert!(outcome.is_success());
        assert_eq!(flash.write_calls(), 0);
    }

    #[test]
    fn test_begin_failure_propagates() {
        let flash = MemFlash::with_slot_capacity(8);
        let mut session = UpdateSession::new(flash).unwrap();
        session.start();

        let err = session.begin(9).unwrap_err();
        assert!(matches!(err, StorageError::BeginFailed { .. }));

        let outcome = session.fail(err.code());
        assert_eq!(outcome, UpdateOutcome::failed(code::STORAGE_BEGIN));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_write_failure_then_fail_discards_staged_bytes() {
        let flash = MemFlash::with_slot_capacity(4);
        let mut session = streaming_session(&flash, 4);

        // slot capacity is checked per write, not only at begin
        session.write(b"1234").unwrap();
        drop(session.fail(code::STORAGE_WRITE));

        assert!(flash.image("ota_1").is_none());
    }

    #[test]
    fn test_set_boot_failure_yields_failed_outcome() {
        #[derive(Debug)]
        struct BootlessFlash(MemFlash);

        impl FirmwareStorage for BootlessFlash {
            type Writer = <MemFlash as FirmwareStorage>::Writer;

            fn next_update_partition(&mut self) -> Result<Partition, StorageError> {
                self.0.next_update_partition()
            }

            fn begin(&mut self, target: &Partition, size: UpdateSize) -> Result<Self::Writer, StorageError> {
                self.0.begin(target, size)
            }

            fn set_boot_partition(&mut self, _target: &Partition) -> Result<(), StorageError> {
                Err(StorageError::set_boot_failed("otadata region corrupt"))
            }

            fn boot_partition(&self) -> Result<Partition, StorageError> {
                self.0.boot_partition()
            }
        }

        let mut session = UpdateSession::new(BootlessFlash(MemFlash::new())).unwrap();
        session.start();
        session.begin(2).unwrap();
        session.write(b"ok").unwrap();

        let outcome = session.finalize();
        assert_eq!(outcome, UpdateOutcome::failed(code::STORAGE_SET_BOOT));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_terminal_failure_releases_writer() {
        let flash = MemFlash::new();
        let mut session = streaming_session(&flash, 10);
        session.write(b"01234").unwrap();

        let outcome = session.fail(code::TRUNCATED);
        assert_eq!(outcome, UpdateOutcome::failed(code::TRUNCATED));

        // nothing committed, a later writer can claim the slot
        assert!(flash.image("ota_1").is_none());
    }
}
