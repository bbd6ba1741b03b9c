//! Streaming request framing.
//!
//! # Responsibilities
//! - Accumulate raw byte fragments until one request is fully framed
//! - Split the head into request line and headers
//! - Read exactly `Content-Length` body bytes (0 when absent)
//! - Keep bytes that belong to the next request for the next call
//!
//! # Design Decisions
//! - The parser is synchronous and I/O free; [`HttpReader`] drives it from
//!   an async stream
//! - A stream that ends before a request is framed yields `None`, never a
//!   partial message
//! - Head size is always capped. The body cap applies only where a body is
//!   buffered whole ([`MessageParser::next_message`],
//!   [`HttpReader::read_body`]); bodies relayed with
//!   [`HttpReader::copy_body`] are streamed and never held in full

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::message::{Headers, HttpMessage, CONTENT_LENGTH};

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 4096;

/// Errors that abandon a connection before any response is written.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("malformed request line: {0:?}")]
    RequestLine(String),

    #[error("malformed header line: {0:?}")]
    HeaderLine(String),

    #[error("invalid Content-Length: {0:?}")]
    ContentLength(String),

    #[error("request head is not valid UTF-8")]
    Encoding,

    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("request body of {length} bytes exceeds {limit} bytes")]
    BodyTooLarge { length: usize, limit: usize },

    #[error("I/O error while reading request: {0}")]
    Io(#[from] std::io::Error),
}

/// Size caps applied while framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_head_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_head_bytes: 64 * 1024,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Incremental request parser over an accumulation buffer.
#[derive(Debug, Default)]
pub struct MessageParser {
    buffer: Vec<u8>,
    limits: ParseLimits,
}

impl MessageParser {
    pub fn new(limits: ParseLimits) -> Self {
        Self {
            buffer: Vec::new(),
            limits,
        }
    }

    /// Append a fragment read from the stream.
    pub fn feed(&mut self, fragment: &[u8]) {
        self.buffer.extend_from_slice(fragment);
    }

    /// Bytes received but not yet consumed by a framed message.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn take_buffered(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Try to frame one message from the buffer, body included.
    ///
    /// Returns `Ok(None)` while more bytes are needed.
    pub fn next_message(&mut self) -> Result<Option<HttpMessage>, FramingError> {
        let Some(head) = self.frame_head()? else {
            return Ok(None);
        };
        self.check_body(head.content_length)?;
        if self.buffer.len() < head.head_end + head.content_length {
            return Ok(None);
        }

        let length = head.content_length;
        let mut message = self.split_head(head);
        let body = self.take(length);
        message.attach_body(body);
        Ok(Some(message))
    }

    /// Frame the next request head and leave its body in the buffer.
    ///
    /// No body limit applies; the caller decides whether to read the body
    /// with [`HttpReader::read_body`] or stream it.
    pub fn next_head(&mut self) -> Result<Option<HttpMessage>, FramingError> {
        Ok(self.frame_head()?.map(|head| self.split_head(head)))
    }

    fn frame_head(&self) -> Result<Option<Head>, FramingError> {
        let head_end = match find(&self.buffer, HEAD_TERMINATOR) {
            Some(pos) => pos + HEAD_TERMINATOR.len(),
            None => {
                if self.buffer.len() > self.limits.max_head_bytes {
                    return Err(FramingError::HeadTooLarge {
                        limit: self.limits.max_head_bytes,
                    });
                }
                return Ok(None);
            }
        };
        if head_end > self.limits.max_head_bytes {
            return Err(FramingError::HeadTooLarge {
                limit: self.limits.max_head_bytes,
            });
        }

        let text = std::str::from_utf8(&self.buffer[..head_end - HEAD_TERMINATOR.len()])
            .map_err(|_| FramingError::Encoding)?;
        let mut lines = text.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        let (method, target, version) = parse_request_line(request_line)?;

        let mut headers = Headers::new();
        let mut content_length = 0usize;
        for line in lines {
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| FramingError::HeaderLine(line.to_string()))?;
            if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| FramingError::ContentLength(value.to_string()))?;
            }
            headers.insert(name, value);
        }

        Ok(Some(Head {
            method,
            target,
            version,
            headers,
            head_end,
            content_length,
        }))
    }

    fn check_body(&self, length: usize) -> Result<(), FramingError> {
        if length > self.limits.max_body_bytes {
            return Err(FramingError::BodyTooLarge {
                length,
                limit: self.limits.max_body_bytes,
            });
        }
        Ok(())
    }

    fn split_head(&mut self, head: Head) -> HttpMessage {
        let raw = self.take(head.head_end);
        HttpMessage::from_head(head.method, head.target, head.version, head.headers, raw)
    }

    /// Remove up to `len` bytes from the front of the buffer.
    fn take(&mut self, len: usize) -> Vec<u8> {
        let rest = self.buffer.split_off(len.min(self.buffer.len()));
        std::mem::replace(&mut self.buffer, rest)
    }
}

struct Head {
    method: String,
    target: String,
    version: String,
    headers: Headers,
    head_end: usize,
    content_length: usize,
}

fn parse_request_line(line: &str) -> Result<(String, String, String), FramingError> {
    let mut parts = line.split(' ');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version), None)
            if !method.is_empty() && !target.is_empty() && !version.is_empty() =>
        {
            Ok((method.to_string(), target.to_string(), version.to_string()))
        }
        _ => Err(FramingError::RequestLine(line.to_string())),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Frame one message from a finite sequence of fragments.
///
/// Returns `Ok(None)` if the fragments run out before a message is complete.
pub fn parse_fragments<I, B>(fragments: I, limits: ParseLimits) -> Result<Option<HttpMessage>, FramingError>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut parser = MessageParser::new(limits);
    for fragment in fragments {
        parser.feed(fragment.as_ref());
        if let Some(message) = parser.next_message()? {
            return Ok(Some(message));
        }
    }
    Ok(None)
}

/// Reads framed requests from an async byte stream, one at a time.
#[derive(Debug)]
pub struct HttpReader<R> {
    inner: R,
    parser: MessageParser,
}

impl<R: AsyncRead + Unpin> HttpReader<R> {
    pub fn new(inner: R, limits: ParseLimits) -> Self {
        Self {
            inner,
            parser: MessageParser::new(limits),
        }
    }

    /// Read the next request, body included. `Ok(None)` means the stream
    /// ended first.
    pub async fn read_message(&mut self) -> Result<Option<HttpMessage>, FramingError> {
        loop {
            if let Some(message) = self.parser.next_message()? {
                return Ok(Some(message));
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }
    }

    /// Read the next request head only. Its body is left on the stream.
    pub async fn read_head(&mut self) -> Result<Option<HttpMessage>, FramingError> {
        loop {
            if let Some(head) = self.parser.next_head()? {
                return Ok(Some(head));
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }
    }

    /// Read the body announced by `head` into it, under the body limit.
    ///
    /// Returns `Ok(false)` if the stream ends before the body is complete.
    pub async fn read_body(&mut self, head: &mut HttpMessage) -> Result<bool, FramingError> {
        let length = head.content_length().saturating_sub(head.body().len());
        self.parser.check_body(length)?;
        while self.parser.buffered().len() < length {
            if !self.fill().await? {
                return Ok(false);
            }
        }
        let body = self.parser.take(length);
        head.attach_body(body);
        Ok(true)
    }

    /// Copy `length` body bytes to `writer` chunk by chunk, without holding
    /// the whole body. `on_chunk` runs after every write.
    pub async fn copy_body<W>(
        &mut self,
        length: usize,
        writer: &mut W,
        mut on_chunk: impl FnMut(),
    ) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let buffered = self.parser.take(length);
        if !buffered.is_empty() {
            writer.write_all(&buffered).await?;
            on_chunk();
        }

        let mut remaining = length - buffered.len();
        let mut chunk = [0u8; READ_CHUNK];
        while remaining > 0 {
            let want = remaining.min(READ_CHUNK);
            let n = self.inner.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream closed with {remaining} body bytes outstanding"),
                ));
            }
            writer.write_all(&chunk[..n]).await?;
            on_chunk();
            remaining -= n;
        }
        Ok(length as u64)
    }

    /// Read one chunk into the parser. `false` at end of stream.
    async fn fill(&mut self) -> Result<bool, FramingError> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.inner.read(&mut chunk).await?;
        if n == 0 {
            if !self.parser.buffered().is_empty() {
                tracing::debug!(
                    discarded = self.parser.buffered().len(),
                    "Stream closed mid-request"
                );
            }
            return Ok(false);
        }
        self.parser.feed(&chunk[..n]);
        Ok(true)
    }

    /// Give back the stream together with any read-ahead bytes.
    pub fn into_parts(mut self) -> (R, Vec<u8>) {
        let buffered = self.parser.take_buffered();
        (self.inner, buffered)
    }
}
