use bytes::Bytes;

/// Represents one item produced by the request decoder stack.
///
/// A connection yields exactly one `Header` (once the preamble terminator has
/// been located and the declared length extracted), followed by zero or more
/// payload items carrying the firmware image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The parsed request preamble
    Header(RequestHead),
    /// A chunk of payload data or EOF marker
    Payload(PayloadItem),
}

/// The portion of the request preamble this receiver cares about.
///
/// Method, path and version are deliberately not represented: any preamble
/// block that declares a content length is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHead {
    content_length: u64,
}

impl RequestHead {
    pub fn new(content_length: u64) -> Self {
        Self { content_length }
    }

    /// The declared payload size in bytes.
    #[inline]
    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

/// Represents an item in the payload stream.
///
/// Produced by the length decoder: data chunks while the declared count is
/// unsatisfied, then a single EOF marker exactly when it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    /// A chunk of payload data
    Chunk(Bytes),
    /// Marks the end of the payload stream
    Eof,
}

impl Message {
    /// Returns true if this message contains payload data
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    /// Returns true if this message contains the parsed preamble
    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    /// Converts the message into a PayloadItem if it contains payload data
    ///
    /// Returns None if the message contains the preamble
    pub fn into_payload_item(self) -> Option<PayloadItem> {
        match self {
            Message::Header(_) => None,
            Message::Payload(payload_item) => Some(payload_item),
        }
    }
}

impl PayloadItem {
    /// Returns true if this item represents the end of the payload stream
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    /// Returns true if this item contains chunk data
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    /// Returns a reference to the contained bytes if this is a Chunk
    ///
    /// Returns None if this is an EOF marker
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the PayloadItem and returns the contained bytes if this is a Chunk
    ///
    /// Returns None if this is an EOF marker
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
