use std::time::Duration;

use bytes::BytesMut;
use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::codec::{Decoder, FramedWrite};
use tracing::{error, info, warn};

use crate::codec::{OutcomeEncoder, RequestDecoder};
use crate::protocol::{Message, OtaError, PayloadItem, SendError, UpdateOutcome, code};
use crate::session::UpdateSession;
use crate::storage::FirmwareStorage;

/// Capacity reserved ahead of each read; one socket chunk at most
const READ_BUFFER_SIZE: usize = 4 * 1024;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_MAX_READ_ERRORS: u32 = 8;

/// A connection that receives one firmware image and reports the outcome
///
/// `UpdateConnection` handles the full lifecycle of an accepted connection:
/// - Reading and incrementally decoding the request
/// - Streaming payload chunks into the update session
/// - Bounding reads with a timeout and a transient-error budget
/// - Rendering the terminal outcome back to the client
///
/// The loop's termination never depends on a sentinel length: it ends on
/// `received == expected`, explicit end-of-stream, a parse or storage error,
/// a read timeout, or the read-error budget.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct UpdateConnection<R, W> {
    reader: R,
    framed_write: FramedWrite<W, OutcomeEncoder>,
    decoder: RequestDecoder,
    buffer: BytesMut,
    read_timeout: Duration,
    max_read_errors: u32,
}

impl<R, W> UpdateConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            framed_write: FramedWrite::new(writer, OutcomeEncoder),
            decoder: RequestDecoder::new(),
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_read_errors: DEFAULT_MAX_READ_ERRORS,
        }
    }

    /// Bounds each individual read; expiry fails the session.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Bounds the cumulative number of transient read errors tolerated.
    pub fn with_max_read_errors(mut self, max_read_errors: u32) -> Self {
        self.max_read_errors = max_read_errors;
        self
    }

    /// Drives `session` to a terminal state and reports the outcome.
    ///
    /// The outcome is rendered and sent to the client whatever the terminal
    /// state was; only a failure to deliver it surfaces as `Err`.
    pub async fn process<S>(mut self, mut session: UpdateSession<S>) -> Result<UpdateOutcome, OtaError>
    where
        S: FirmwareStorage,
    {
        let outcome = self.drive(&mut session).await;

        self.framed_write.send(&outcome).await?;
        self.framed_write.get_mut().shutdown().await.map_err(SendError::io)?;
        info!(success = outcome.is_success(), "reported outcome, connection shutdown");

        Ok(outcome)
    }

    async fn drive<S>(&mut self, session: &mut UpdateSession<S>) -> UpdateOutcome
    where
        S: FirmwareStorage,
    {
        session.start();
        let mut read_errors = 0u32;

        loop {
            // Drain every decodable message before touching the socket again;
            // a single read may carry the preamble and part of the payload.
            loop {
                match self.decoder.decode(&mut self.buffer) {
                    Ok(Some(Message::Header(head))) => {
                        if let Err(e) = session.begin(head.content_length()) {
                            error!(cause = %e, "can't open storage write session");
                            return session.fail(e.code());
                        }
                    }

                    Ok(Some(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                        if let Err(e) = session.write(&bytes) {
                            error!(cause = %e, "storage write failed");
                            return session.fail(e.code());
                        }
                    }

                    Ok(Some(Message::Payload(PayloadItem::Eof))) => {
                        return session.finalize();
                    }

                    Ok(None) => break,

                    Err(e) => {
                        error!(cause = %e, "can't parse request");
                        return session.fail(e.code());
                    }
                }
            }

            self.buffer.reserve(READ_BUFFER_SIZE);
            match timeout(self.read_timeout, self.reader.read_buf(&mut self.buffer)).await {
                Err(_elapsed) => {
                    warn!(read_timeout = ?self.read_timeout, "read timed out, peer went silent");
                    return session.fail(code::READ_TIMEOUT);
                }

                Ok(Ok(0)) => {
                    warn!(
                        received = session.received(),
                        expected = session.expected(),
                        "connection closed before transfer completed"
                    );
                    return session.fail(code::TRUNCATED);
                }

                Ok(Ok(_read)) => {}

                // A failed read is not end-of-transfer; it only counts
                // against the error budget.
                Ok(Err(e)) => {
                    read_errors += 1;
                    warn!(cause = %e, read_errors, "read error");
                    if read_errors >= self.max_read_errors {
                        error!(read_errors, "read error budget exhausted");
                        return session.fail(code::READ_FAILED);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemFlash;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{ReadBuf, duplex, split};

    fn connection_pair() -> (UpdateConnection<impl AsyncRead + Unpin, impl AsyncWrite + Unpin>, tokio::io::DuplexStream) {
        let (client, server) = duplex(64 * 1024);
        let (reader, writer) = split(server);
        (UpdateConnection::new(reader, writer), client)
    }

    fn session(flash: &MemFlash) -> UpdateSession<MemFlash> {
        UpdateSession::new(flash.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_full_update_in_single_write() {
        let flash = MemFlash::new();
        let (connection, mut client) = connection_pair();
        let session = session(&flash);

        let client_task = async {
            client.write_all(b"POST /ota HTTP/1.1\r\nContent-Length: 4\r\n\r\n\xDE\xAD\xBE\xEF").await.unwrap();
            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            response
        };

        let (outcome, response) = tokio::join!(connection.process(session), client_task);

        let outcome = outcome.unwrap();
        assert_eq!(outcome, UpdateOutcome::succeeded("ota_1"));
        assert_eq!(flash.image("ota_1").unwrap(), &[0xDE, 0xAD, 0xBE, 0xEF]);

        let response = String::from_utf8(response).unwrap();
        assert!(response.starts_with("200 OK\n\n"));
        assert!(response.contains("ota_1"));
    }

    #[tokio::test]
    async fn test_update_streamed_in_pieces() {
        let flash = MemFlash::new();
        let (connection, mut client) = connection_pair();
        let session = session(&flash);

        let client_task = async {
            // preamble terminator split across two writes
            client.write_all(b"POST /fw HTTP/1.1\r\nContent-Length: 8\r\n").await.unwrap();
            client.flush().await.unwrap();
            client.write_all(b"\r\n").await.unwrap();
            client.flush().await.unwrap();

            client.write_all(b"fir").await.unwrap();
            client.flush().await.unwrap();
            client.write_all(b"mware").await.unwrap();

            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            response
        };

        let (outcome, response) = tokio::join!(connection.process(session), client_task);

        assert!(outcome.unwrap().is_success());
        assert_eq!(flash.image("ota_1").unwrap(), b"firmware");
        assert!(String::from_utf8(response).unwrap().contains("ota_1"));
    }

    #[tokio::test]
    async fn test_missing_content_length_touches_no_storage() {
        let flash = MemFlash::new();
        let (connection, mut client) = connection_pair();
        let session = session(&flash);

        let client_task = async {
            client.write_all(b"POST /ota HTTP/1.1\r\nHost: device\r\n\r\n").await.unwrap();
            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            response
        };

        let (outcome, response) = tokio::join!(connection.process(session), client_task);

        assert_eq!(outcome.unwrap(), UpdateOutcome::failed(code::CONTENT_LENGTH_MISSING));
        assert_eq!(flash.begin_calls(), 0);
        assert_eq!(flash.write_calls(), 0);
        assert!(String::from_utf8(response).unwrap().starts_with("400 Bad Request\n\n"));
    }

    #[tokio::test]
    async fn test_overrun_aborts_without_commit() {
        let flash = MemFlash::new();
        let (connection, mut client) = connection_pair();
        let session = session(&flash);

        let client_task = async {
            // one byte more than declared
            client.write_all(b"POST /ota HTTP/1.1\r\nContent-Length: 4\r\n\r\n12345").await.unwrap();
            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            response
        };

        let (outcome, _response) = tokio::join!(connection.process(session), client_task);

        assert_eq!(outcome.unwrap(), UpdateOutcome::failed(code::OVERRUN));
        assert!(flash.image("ota_1").is_none());
    }

    #[tokio::test]
    async fn test_zero_length_image() {
        let flash = MemFlash::new();
        let (connection, mut client) = connection_pair();
        let session = session(&flash);

        let client_task = async {
            client.write_all(b"POST /ota HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await.unwrap();
            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            response
        };

        let (outcome, _response) = tokio::join!(connection.process(session), client_task);

        assert!(outcome.unwrap().is_success());
        assert_eq!(flash.write_calls(), 0);
        assert_eq!(flash.begin_calls(), 1);
    }

    #[tokio::test]
    async fn test_early_close_is_truncated() {
        let flash = MemFlash::new();
        let (connection, mut client) = connection_pair();
        let session = session(&flash);

        let client_task = async {
            client.write_all(b"POST /ota HTTP/1.1\r\nContent-Length: 8\r\n\r\n1234").await.unwrap();
            client.shutdown().await.unwrap();
            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            response
        };

        let (outcome, response) = tokio::join!(connection.process(session), client_task);

        assert_eq!(outcome.unwrap(), UpdateOutcome::failed(code::TRUNCATED));
        assert!(flash.image("ota_1").is_none());
        assert!(String::from_utf8(response).unwrap().contains("0x201"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let flash = MemFlash::new();
        let (connection, mut client) = connection_pair();
        let connection = connection.with_read_timeout(Duration::from_secs(5));
        let session = session(&flash);

        let client_task = async {
            // send the preamble, then go silent while keeping the
            // connection open
            client.write_all(b"POST /ota HTTP/1.1\r\nContent-Length: 4\r\n\r\n").await.unwrap();
            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            response
        };

        let (outcome, _response) = tokio::join!(connection.process(session), client_task);

        assert_eq!(outcome.unwrap(), UpdateOutcome::failed(code::READ_TIMEOUT));
    }

    /// A reader that always fails; every read burns error budget.
    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        }
    }

    #[tokio::test]
    async fn test_read_error_budget_is_bounded() {
        let flash = MemFlash::new();
        let connection = UpdateConnection::new(FailingReader, tokio::io::sink()).with_max_read_errors(3);
        let session = session(&flash);

        let outcome = connection.process(session).await.unwrap();

        assert_eq!(outcome, UpdateOutcome::failed(code::READ_FAILED));
        assert_eq!(flash.begin_calls(), 0);
    }
}
