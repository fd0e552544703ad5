//! The runnable firmware-update receiver daemon
//!
//! Wires the `micro-ota` core to a real machine: a bound IPv4 socket, a
//! file-backed flash layout, a restart capability and a supervisor that
//! sequences exactly one update attempt per process lifetime.
//!
//! # Architecture
//!
//! - [`config`]: builder-style configuration (port, backlog, read timeout,
//!   read-error budget, restart policy)
//! - [`listener`]: bind/listen/accept — exactly one connection, enforced by
//!   move semantics
//! - [`flash`]: `FileFlash`, a two-slot file-backed [`FirmwareStorage`]
//!   backend with a persisted boot marker
//! - [`restart`]: the restart capability; [`restart::ProcessRestart`]
//!   terminates the process so the service manager relaunches it
//! - [`supervisor`]: accept → drive → report → restart decision
//!
//! [`FirmwareStorage`]: micro_ota::storage::FirmwareStorage

pub mod config;
pub mod flash;
pub mod listener;
pub mod restart;
pub mod supervisor;

pub use config::{ReceiverConfig, RestartPolicy};
pub use flash::FileFlash;
pub use listener::UpdateListener;
pub use restart::ProcessRestart;
pub use supervisor::Supervisor;
