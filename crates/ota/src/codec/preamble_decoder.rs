//! Incremental decoder for the request preamble.
//!
//! The preamble is an HTTP-like block of text terminated by the first
//! `\r\n\r\n` sequence. The only thing this receiver extracts from it is the
//! declared payload length; method, path, version and every other header line
//! are passed over without inspection.
//!
//! # Incremental operation
//!
//! The terminator may arrive split across any number of reads. The decoder
//! keeps a resume offset into the accumulated buffer and backs it up by
//! `terminator length - 1` bytes on each call, so a sequence spanning two
//! reads is found without rescanning everything seen so far.
//!
//! # Limits
//!
//! - Maximum preamble size: 8KB
//!
//! A buffer that grows past the limit without containing the terminator
//! aborts parsing; nothing is ever handed to storage in that case.

use bytes::BytesMut;
use memchr::memmem;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, RequestHead};

/// Maximum size in bytes allowed for the entire preamble
const MAX_PREAMBLE_BYTES: usize = 8 * 1024;

/// The preamble/payload boundary sequence
const TERMINATOR: &[u8] = b"\r\n\r\n";

/// The token introducing the declared payload length. Matched case-sensitively.
const CONTENT_LENGTH_TOKEN: &[u8] = b"Content-Length:";

/// Decoder for the request preamble implementing the [`Decoder`] trait.
///
/// Yields a [`RequestHead`] once the boundary has been located and the
/// declared length extracted; the preamble bytes are consumed from the source
/// buffer so that the payload starts at offset zero for the next decoder.
#[derive(Debug, Default)]
pub struct PreambleDecoder {
    /// How far the terminator search has progressed in the accumulated buffer
    scanned: usize,
}

impl PreambleDecoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Decoder for PreambleDecoder {
    type Item = RequestHead;
    type Error = ParseError;

    /// Attempts to locate the preamble boundary in the accumulated buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(head))` if the boundary was found and the length parsed
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if the preamble is oversized or the length is
    ///   missing or malformed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Resume where the previous call stopped, backed up far enough that a
        // terminator straddling the previous read boundary is still matched.
        let resume_at = self.scanned.saturating_sub(TERMINATOR.len() - 1);

        match memmem::find(&src[resume_at..], TERMINATOR) {
            Some(found) => {
                let body_offset = resume_at + found + TERMINATOR.len();
                ensure!(
                    body_offset <= MAX_PREAMBLE_BYTES,
                    ParseError::too_large_preamble(body_offset, MAX_PREAMBLE_BYTES)
                );

                let preamble = src.split_to(body_offset).freeze();
                let content_length = parse_content_length(&preamble)?;
                trace!(content_length, preamble_size = body_offset, "parsed request preamble");

                Ok(Some(RequestHead::new(content_length)))
            }
            None => {
                ensure!(src.len() <= MAX_PREAMBLE_BYTES, ParseError::too_large_preamble(src.len(), MAX_PREAMBLE_BYTES));
                self.scanned = src.len();
                Ok(None)
            }
        }
    }
}

/// Extracts the declared payload length from a complete preamble block.
///
/// The search is byte-exact (case-sensitive) and restricted to the preamble;
/// payload bytes are never scanned. After the token, optional space or tab is
/// skipped, then a non-empty run of ASCII decimal digits is required.
///
/// # Errors
///
/// Returns `ParseError::ContentLengthMissing` if the token is absent, no
/// digits follow it, or the value overflows `u64`.
fn parse_content_length(preamble: &[u8]) -> Result<u64, ParseError> {
    let token_at = memmem::find(preamble, CONTENT_LENGTH_TOKEN)
        .ok_or_else(|| ParseError::content_length_missing("token not present"))?;

    let after_token = &preamble[token_at + CONTENT_LENGTH_TOKEN.len()..];
    let skipped = after_token.iter().take_while(|b| matches!(b, b' ' | b'\t')).count();
    let digits: &[u8] = &after_token[skipped..];

    let mut value: u64 = 0;
    let mut digit_count = 0usize;
    for b in digits.iter().take_while(|b| b.is_ascii_digit()) {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .ok_or_else(|| ParseError::content_length_missing("value overflows u64"))?;
        digit_count += 1;
    }

    ensure!(digit_count > 0, ParseError::content_length_missing("no decimal digits after token"));

    Ok(value)
}
