//! Decoder implementation for the length-delimited firmware payload.
//!
//! The payload size is declared up front by the request preamble; this
//! decoder counts it down, yielding the image bytes as they arrive and an EOF
//! marker exactly when the declared count is satisfied.

use std::cmp;

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A decoder for a payload with a known content length.
///
/// The decoder tracks the remaining bytes to be read. Surplus bytes beyond
/// the declared length are a protocol violation and surface as
/// [`ParseError::Overrun`] instead of being passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// The declared total, kept for error reporting
    declared: u64,
    /// The number of bytes remaining to be read from the payload
    remaining: u64,
}

impl LengthDecoder {
    /// Creates a new LengthDecoder instance.
    ///
    /// # Arguments
    /// * `length` - The total content length to decode, as declared by the preamble
    pub fn new(length: u64) -> Self {
        Self { declared: length, remaining: length }
    }

    /// The total length declared by the preamble.
    pub fn declared(&self) -> u64 {
        self.declared
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes bytes from the input buffer according to the declared length.
    ///
    /// # Returns
    /// * `Ok(Some(PayloadItem::Eof))` when all declared bytes have been read
    /// * `Ok(Some(PayloadItem::Chunk(bytes)))` when a chunk is available
    /// * `Ok(None)` when more data is needed
    /// * `Err(ParseError::Overrun)` when bytes beyond the declared length are present
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            if !src.is_empty() {
                return Err(ParseError::overrun(self.declared, src.len()));
            }
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        // Read the minimum of remaining length and available bytes
        let len = cmp::min(self.remaining, src.len() as u64);
        let bytes = src.split_to(len as usize).freeze();

        self.remaining -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}
