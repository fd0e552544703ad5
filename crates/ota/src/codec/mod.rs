//! Codec module for decoding the update request and encoding the reply
//!
//! This module provides functionality for streaming message processing,
//! using a state machine pattern to handle both the request preamble and the
//! firmware payload incrementally.
//!
//! # Architecture
//!
//! - Request handling:
//!   - [`RequestDecoder`]: drives one request from preamble to payload EOF
//!   - Preamble parsing via [`PreambleDecoder`]
//!   - Payload decoding via [`LengthDecoder`]
//!
//! - Response handling:
//!   - [`OutcomeEncoder`]: renders the terminal status message
//!
//! # Example
//!
//! ```no_run
//! use micro_ota::codec::{OutcomeEncoder, RequestDecoder};
//! use tokio_util::codec::{Decoder, Encoder};
//! use bytes::BytesMut;
//!
//! // Decode incoming request
//! let mut decoder = RequestDecoder::new();
//! let mut request_buffer = BytesMut::new();
//! let message = decoder.decode(&mut request_buffer);
//!
//! // Encode the terminal outcome
//! let mut encoder = OutcomeEncoder;
//! let mut response_buffer = BytesMut::new();
//! // ... encode outcome ...
//! ```

mod length_decoder;
mod outcome_encoder;
mod preamble_decoder;
mod request_decoder;

pub use length_decoder::LengthDecoder;
pub use outcome_encoder::OutcomeEncoder;
pub use preamble_decoder::PreambleDecoder;
pub use request_decoder::RequestDecoder;
