//! Update request decoder module
//!
//! This module provides functionality for decoding one firmware-update
//! request using a streaming approach. It handles both preamble parsing and
//! payload decoding through a state machine pattern.
//!
//! # Components
//!
//! - [`RequestDecoder`]: Main decoder that coordinates preamble and payload parsing
//! - Preamble parsing: Uses [`PreambleDecoder`] for locating the boundary and length
//! - Payload handling: Uses [`LengthDecoder`] for the length-delimited image bytes
//!
//! # Example
//!
//! ```no_run
//! use micro_ota::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::new();
//! // ... add received data to buffer ...
//! let result = decoder.decode(&mut buffer);
//! ```

use crate::codec::length_decoder::LengthDecoder;
use crate::codec::preamble_decoder::PreambleDecoder;
use crate::protocol::{Message, ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A decoder for one update request that handles both preamble and payload
///
/// The decoder operates in three phases:
/// 1. Preamble parsing: locates the boundary and the declared length
/// 2. Payload parsing: counts the image bytes down to zero
/// 3. Done: the request is complete; any further bytes are a protocol violation
///
/// Exactly one request exists per process lifetime, so unlike a keep-alive
/// server the decoder never resets to phase 1.
#[derive(Debug)]
pub struct RequestDecoder {
    phase: Phase,
}

#[derive(Debug)]
enum Phase {
    Preamble(PreambleDecoder),
    Payload(LengthDecoder),
    Done { declared: u64 },
}

impl RequestDecoder {
    /// Creates a new `RequestDecoder` instance
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { phase: Phase::Preamble(PreambleDecoder::new()) }
    }
}

impl Decoder for RequestDecoder {
    type Item = Message;
    type Error = ParseError;

    /// Attempts to decode the next message from the provided buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: Successfully decoded the preamble
    /// - `Ok(Some(Message::Payload(_)))`: Successfully decoded a payload chunk or EOF
    /// - `Ok(None)`: Need more data to proceed
    /// - `Err(_)`: Encountered a parsing error
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.phase {
            Phase::Preamble(preamble_decoder) => {
                let message = match preamble_decoder.decode(src)? {
                    Some(head) => {
                        self.phase = Phase::Payload(LengthDecoder::new(head.content_length()));
                        Some(Message::Header(head))
                    }
                    None => None,
                };
                Ok(message)
            }

            Phase::Payload(length_decoder) => {
                let declared = length_decoder.declared();
                let message = match length_decoder.decode(src)? {
                    Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                    Some(item @ PayloadItem::Eof) => {
                        self.phase = Phase::Done { declared };
                        Some(Message::Payload(item))
                    }
                    None => None,
                };
                Ok(message)
            }

            Phase::Done { declared } => {
                if !src.is_empty() {
                    return Err(ParseError::overrun(*declared, src.len()));
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn preamble(len: usize) -> BytesMut {
        let text = indoc! {"
            POST /ota HTTP/1.1
            Host: 192.168.4.1
            Content-Length: LEN

        "}
        .replace("LEN", &len.to_string())
        .replace('\n', "\r\n");
        BytesMut::from(text.as_bytes())
    }

    #[test]
    fn test_header_then_payload_then_eof() {
        let mut buffer = preamble(4);
        buffer.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let mut decoder = RequestDecoder::new();

        let message = decoder.decode(&mut buffer).unwrap().unwrap();
        match message {
            Message::Header(head) => assert_eq!(head.content_length(), 4),
            Message::Payload(_) => panic!("expected header first"),
        }

        let message = decoder.decode(&mut buffer).unwrap().unwrap();
        let chunk = message.into_payload_item().unwrap();
        assert_eq!(&chunk.into_bytes().unwrap()[..], &[0xDE, 0xAD, 0xBE, 0xEF]);

        let message = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(message.into_payload_item().unwrap().is_eof());

        // drained, no further messages
        assert!(decoder.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_zero_length_yields_header_then_eof() {
        let mut buffer = preamble(0);
        let mut decoder = RequestDecoder::new();

        let message = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(message.is_header());

        let message = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(message.into_payload_item().unwrap().is_eof());
    }

    #[test]
    fn test_payload_across_reads() {
        let mut buffer = preamble(6);
        let mut decoder = RequestDecoder::new();

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_header());
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"abc");
        let chunk = decoder.decode(&mut buffer).unwrap().unwrap().into_payload_item().unwrap();
        assert_eq!(&chunk.into_bytes().unwrap()[..], b"abc");

        buffer.extend_from_slice(b"def");
        let chunk = decoder.decode(&mut buffer).unwrap().unwrap().into_payload_item().unwrap();
        assert_eq!(&chunk.into_bytes().unwrap()[..], b"def");

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().into_payload_item().unwrap().is_eof());
    }

    #[test]
    fn test_bytes_after_completion_are_overrun() {
        let mut buffer = preamble(2);
        buffer.extend_from_slice(b"ok");

        let mut decoder = RequestDecoder::new();
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_header());
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_payload());
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().into_payload_item().unwrap().is_eof());

        buffer.extend_from_slice(b"!");
        let err = decoder.decode(&mut buffer).unwrap_err();
        assert!(matches!(err, ParseError::Overrun { declared: 2, excess: 1 }));
    }
}
