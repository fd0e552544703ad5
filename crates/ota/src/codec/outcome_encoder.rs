//! Encoder for the terminal status message sent back to the client.
//!
//! The reply is deliberately not a conformant HTTP response: a short status
//! token, a blank line, and a one-line message naming either the selected
//! boot partition or the numeric error code. Update tooling treats the
//! leading token as the success/failure indicator.

use crate::protocol::{SendError, UpdateOutcome};
use bytes::{BufMut, BytesMut};
use std::io;
use std::io::Write;
use tokio_util::codec::Encoder;

/// Initial buffer size reserved for the status message
const INIT_MESSAGE_SIZE: usize = 128;

/// Encoder for [`UpdateOutcome`] implementing the [`Encoder`] trait.
#[derive(Debug, Default)]
pub struct OutcomeEncoder;

impl Encoder<&UpdateOutcome> for OutcomeEncoder {
    type Error = SendError;

    /// Serializes the outcome into the destination buffer.
    fn encode(&mut self, item: &UpdateOutcome, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(INIT_MESSAGE_SIZE);
        match item {
            UpdateOutcome::Succeeded { label } => {
                write!(FastWrite(dst), "200 OK\n\nSuccess. Next boot partition is {label}\n")?;
            }
            UpdateOutcome::Failed { error_code } => {
                write!(FastWrite(dst), "400 Bad Request\n\nFailure. Error code: {error_code:#x}\n")?;
            }
        }
        Ok(())
    }
}

/// Fast writer implementation for writing to BytesMut.
///
/// Avoids unnecessary bounds checking when writing to the bytes buffer,
/// since enough space has already been reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    /// Writes a buffer into this writer, returning how many bytes were written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    /// Flush this output stream, ensuring that all intermediately buffered contents reach their destination.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_message_names_the_label() {
        let mut dst = BytesMut::new();
        let outcome = UpdateOutcome::succeeded("ota_1");

        OutcomeEncoder.encode(&outcome, &mut dst).unwrap();

        assert_eq!(&dst[..], b"200 OK\n\nSuccess. Next boot partition is ota_1\n");
    }

    #[test]
    fn test_failure_message_names_the_code() {
        let mut dst = BytesMut::new();
        let outcome = UpdateOutcome::failed(0x0102);

        OutcomeEncoder.encode(&outcome, &mut dst).unwrap();

        assert_eq!(&dst[..], b"400 Bad Request\n\nFailure. Error code: 0x102\n");
    }
}
