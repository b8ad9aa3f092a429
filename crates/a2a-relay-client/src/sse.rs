//! Line framing for server-push event streams.

/// Longest line accepted from an agent stream, in bytes.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// A stream line grew past the framer's limit.
#[derive(Debug, thiserror::Error)]
#[error("stream line exceeds {limit} bytes")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Splits a byte stream into complete text lines.
///
/// Bytes are buffered until a newline arrives, so multi-byte characters
/// split across chunks decode correctly. A line longer than the limit is
/// an error rather than an ever-growing buffer.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    limit: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }
}

impl LineFramer {
    #[must_use]
    pub const fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    /// Buffer a chunk of the stream.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Take the next complete line, if one is buffered.
    ///
    /// Lines are returned in arrival order. Once a line, complete or not,
    /// exceeds the limit the buffer is discarded and `LineTooLong` returned.
    pub fn next_line(&mut self) -> Option<Result<String, LineTooLong>> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(end) if end > self.limit => Some(Err(self.overflow())),
            Some(end) => {
                let line: Vec<u8> = self.buffer.drain(..=end).collect();
                Some(Ok(decode_line(&line[..end])))
            }
            None if self.buffer.len() > self.limit => Some(Err(self.overflow())),
            None => None,
        }
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(decode_line(&rest))
    }

    fn overflow(&mut self) -> LineTooLong {
        self.buffer = Vec::new();
        LineTooLong { limit: self.limit }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Payload of a `data:` line, trimmed. Other lines yield `None`.
#[must_use]
pub fn data_payload(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() { None } else { Some(data) }
}
