//! An asynchronous micro firmware-update receiver
//!
//! This crate provides the core of a device-resident OTA receiver: it accepts
//! the bytes of exactly one inbound connection, incrementally parses a
//! minimal HTTP-like request preamble to locate the declared payload length,
//! streams the firmware image into the inactive storage partition, validates
//! and activates the result, and reports the outcome to the client.
//!
//! # Features
//!
//! - Incremental preamble parsing across read boundaries
//! - Streaming payload writes, no full-image buffering
//! - Strict expected-vs-received accounting (truncation and overrun are
//!   distinct, reported failures)
//! - Per-read timeout and a transient read-error budget, so a silent or
//!   misbehaving peer can never hang the device
//! - Storage behind a capability trait; the flash subsystem stays external
//! - Clean error handling with stable numeric failure codes
//!
//! # Example
//!
//! ```no_run
//! use micro_ota::connection::UpdateConnection;
//! use micro_ota::session::UpdateSession;
//! use micro_ota::storage::MemFlash;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize logging
//!     let subscriber = FmtSubscriber::builder()
//!         .with_max_level(Level::INFO)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     info!(port = 8032, "start listening");
//!     let tcp_listener = match TcpListener::bind("0.0.0.0:8032").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     // exactly one connection is serviced per process lifetime
//!     let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!         Ok(stream_and_addr) => stream_and_addr,
//!         Err(e) => {
//!             error!(cause = %e, "failed to accept");
//!             return;
//!         }
//!     };
//!     drop(tcp_listener);
//!
//!     let session = match UpdateSession::new(MemFlash::new()) {
//!         Ok(session) => session,
//!         Err(e) => {
//!             error!(cause = %e, "no writable update partition");
//!             return;
//!         }
//!     };
//!
//!     let (reader, writer) = tcp_stream.into_split();
//!     let connection = UpdateConnection::new(reader, writer);
//!     match connection.process(session).await {
//!         Ok(outcome) => {
//!             info!(success = outcome.is_success(), "finished update attempt");
//!             // a real device restarts here, whatever the outcome
//!         }
//!         Err(e) => {
//!             error!(cause = %e, "couldn't report outcome, connection shutdown");
//!         }
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`connection`]: Core connection handling and lifecycle management
//! - [`session`]: The update session state machine
//! - [`storage`]: The storage capability seam and an in-memory backend
//! - [`protocol`]: Protocol types, outcomes and error taxonomy
//! - [`codec`]: Request decoding and outcome encoding
//!
//! # Core Components
//!
//! ## Connection Handling
//!
//! The [`connection::UpdateConnection`] type is the entry point for
//! processing an accepted connection. It owns the socket halves, drains the
//! decoder between reads, and guarantees a terminal outcome is rendered to
//! the client no matter how the transfer ends.
//!
//! ## The Update Session
//!
//! [`session::UpdateSession`] owns the exclusive write handle into the
//! inactive partition between `begin` and `finalize`, tracks the
//! expected-vs-received byte counts, and performs the boot-target switch.
//!
//! ## Storage
//!
//! The flash/partition subsystem is an external collaborator expressed as
//! the [`storage::FirmwareStorage`] and [`storage::FirmwareWriter`] traits.
//! What "validate the image" means is the backend's decision; this core only
//! guarantees the byte stream it hands over is exactly the declared payload.
//!
//! ## Error Handling
//!
//! The crate uses custom error types that implement `std::error::Error`:
//!
//! - [`protocol::OtaError`]: Top-level error type
//! - [`protocol::ParseError`]: Request parsing errors
//! - [`protocol::StorageError`]: Flash interaction errors
//! - [`protocol::SendError`]: Response sending errors
//!
//! Every failure maps to a stable numeric code ([`protocol::code`]) that
//! appears in the failure response.
//!
//! # Limitations
//!
//! - Exactly one connection and one request per process lifetime
//! - No authentication or image integrity verification; pair with a signed
//!   bootloader if the transport is untrusted
//! - Maximum preamble size: 8KB
//! - The `Content-Length` token is matched byte-exactly

pub mod codec;
pub mod connection;
pub mod protocol;
pub mod session;
pub mod storage;

mod utils;
pub(crate) use utils::ensure;
