//! Update connection handling module
//!
//! This module provides functionality for driving one accepted connection to
//! a terminal outcome. It implements the core receive loop of the update
//! receiver.
//!
//! # Components
//!
//! - [`UpdateConnection`]: Main connection handler that:
//!   - Owns the socket halves for the session's duration
//!   - Feeds received chunks through the request decoder
//!   - Drives the update session's begin/write/finalize lifecycle
//!   - Bounds every read with a timeout and a transient-error budget
//!   - Always reports the terminal outcome to the client
//!
//! # Features
//!
//! - Asynchronous I/O handling
//! - Incremental request parsing across read boundaries
//! - Deterministic termination on silent or misbehaving peers
//! - Efficient memory usage through a reused read buffer

mod update_connection;

pub use update_connection::UpdateConnection;
