//! Sequences one complete update attempt.
//!
//! accept → drive the session to a terminal state → report → restart
//! decision. The supervisor owns the connection for the whole attempt and
//! consults [`RestartPolicy`] once the outcome is known; restart is invoked
//! at most once per process lifetime.

use thiserror::Error;
use tracing::{error, info, warn};

use micro_ota::connection::UpdateConnection;
use micro_ota::protocol::{OtaError, StorageError, UpdateOutcome};
use micro_ota::session::UpdateSession;
use micro_ota::storage::FirmwareStorage;

use crate::config::{ReceiverConfig, RestartPolicy};
use crate::listener::{ConnectionError, UpdateListener};
use crate::restart::Restart;

#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("connection error: {source}")]
    Connection {
        #[from]
        source: ConnectionError,
    },

    #[error("storage error: {source}")]
    Storage {
        #[from]
        source: StorageError,
    },

    #[error("update error: {source}")]
    Update {
        #[from]
        source: OtaError,
    },
}

/// Drives exactly one update attempt, then restarts per policy.
///
/// The storage capability is cloned into the session; the supervisor keeps
/// its own handle so it can log the persisted boot selection after the
/// attempt.
#[derive(Debug)]
pub struct Supervisor<S, R> {
    config: ReceiverConfig,
    storage: S,
    restart: R,
}

impl<S, R> Supervisor<S, R>
where
    S: FirmwareStorage + Clone,
    R: Restart,
{
    pub fn new(config: ReceiverConfig, storage: S, restart: R) -> Self {
        Self { config, storage, restart }
    }

    /// Binds the configured port and runs one attempt to completion.
    ///
    /// With [`RestartPolicy::Always`] and a process-terminating restart
    /// capability this never returns.
    pub async fn run(mut self) -> Result<UpdateOutcome, ReceiverError> {
        let result = match UpdateListener::bind(self.config.port(), self.config.backlog()) {
            Ok(listener) => self.attempt(listener).await,
            Err(e) => Err(e.into()),
        };
        self.conclude(result)
    }

    /// Runs one attempt on an already-bound listener.
    pub async fn serve(mut self, listener: UpdateListener) -> Result<UpdateOutcome, ReceiverError> {
        let result = self.attempt(listener).await;
        self.conclude(result)
    }

    async fn attempt(&mut self, listener: UpdateListener) -> Result<UpdateOutcome, ReceiverError> {
        let stream = listener.accept().await?;

        let session = UpdateSession::new(self.storage.clone())?;

        let (reader, writer) = stream.into_split();
        let connection = UpdateConnection::new(reader, writer)
            .with_read_timeout(self.config.read_timeout())
            .with_max_read_errors(self.config.max_read_errors());

        let outcome = connection.process(session).await?;
        Ok(outcome)
    }

    fn conclude(&mut self, result: Result<UpdateOutcome, ReceiverError>) -> Result<UpdateOutcome, ReceiverError> {
        let succeeded = match &result {
            Ok(outcome) => {
                info!(success = outcome.is_success(), "update attempt finished");
                outcome.is_success()
            }
            Err(e) => {
                error!(cause = %e, "update attempt aborted");
                false
            }
        };

        if let Ok(boot) = self.storage.boot_partition() {
            info!(partition = %boot, "next boot partition");
        }

        match self.config.restart_policy() {
            RestartPolicy::OnSuccess if !succeeded => {
                warn!("restart withheld after failed attempt, keeping state for diagnosis");
            }
            RestartPolicy::Always | RestartPolicy::OnSuccess => {
                info!("prepare to restart system");
                self.restart.restart();
            }
        }

        result
    }
}
