//! Line framing and frame classification for the modem serial stream
//!
//! The modem answers with CR/LF delimited lines:
//! ```text
//! \r\n+CGPSSTATUS: Location 3D Fix\r\n\r\nOK\r\n
//! ```
//!
//! Unsolicited result codes (URCs) share the same framing, so every frame is
//! classified here before anyone sees it. The SMS text-entry prompt `> ` is
//! the only frame without a line terminator. It is only recognized while the
//! caller expects one; otherwise a message body starting with `> ` would end
//! a reply early.

use bytes::{Buf, BytesMut};
use thiserror::Error;

/// Longest line accepted before the buffer is discarded
pub const MAX_LINE_LEN: usize = 4096;

/// Errors that can occur while framing the inbound stream
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Line too long: {0} bytes without terminator (max: {MAX_LINE_LEN})")]
    LineTooLong(usize),
}

/// Unsolicited notifications recognized on the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Urc {
    /// `+CMTI: "SM",3` - a message was stored at `index`
    NewMessage { storage: String, index: u32 },
    /// Incoming voice call
    Ring,
}

/// One classified inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Unsolicited notification, never part of a reply
    Urc(Urc),
    /// Response line belonging to the exchange in progress
    Line(String),
    /// SMS text-entry prompt
    Prompt,
}

impl Frame {
    /// Whether this frame ends a reply
    pub fn is_final(&self) -> bool {
        match self {
            Frame::Prompt => true,
            Frame::Line(line) => is_final_result(line),
            Frame::Urc(_) => false,
        }
    }

    /// Reply text contributed by this frame
    pub fn text(&self) -> &str {
        match self {
            Frame::Line(line) => line,
            Frame::Prompt => "> ",
            Frame::Urc(_) => "",
        }
    }
}

/// Check if a response line is a final result code
pub fn is_final_result(line: &str) -> bool {
    matches!(
        line,
        "OK" | "ERROR" | "NO CARRIER" | "BUSY" | "NO ANSWER" | "NO DIALTONE"
    ) || line.starts_with("+CME ERROR")
        || line.starts_with("+CMS ERROR")
}

/// Classify a complete line
pub fn classify(line: &str) -> Frame {
    if line == "RING" {
        return Frame::Urc(Urc::Ring);
    }
    if let Some(urc) = line.strip_prefix("+CMTI:").and_then(parse_new_message) {
        return Frame::Urc(urc);
    }
    Frame::Line(line.to_string())
}

/// Parse the `"<storage>",<index>` tail of a `+CMTI` notification
fn parse_new_message(rest: &str) -> Option<Urc> {
    let (storage, index) = rest.trim().split_once(',')?;
    let storage = storage.strip_prefix('"')?.strip_suffix('"')?;
    let index = index.trim().parse().ok()?;

    Some(Urc::NewMessage {
        storage: storage.to_string(),
        index,
    })
}

/// Pull one frame off the front of `buf`
///
/// Blank lines are skipped. `Ok(None)` means no terminator has arrived yet.
/// `> ` becomes [`Frame::Prompt`] only if `prompt_expected` is set. A line
/// longer than [`MAX_LINE_LEN`] clears the buffer and is reported as an
/// overflow.
pub fn decode(buf: &mut BytesMut, prompt_expected: bool) -> Result<Option<Frame>, CodecError> {
    // Blank lines carry nothing
    let skip = buf
        .iter()
        .take_while(|b| **b == b'\r' || **b == b'\n')
        .count();
    buf.advance(skip);

    if buf.is_empty() {
        return Ok(None);
    }

    if prompt_expected {
        if buf.starts_with(b"> ") {
            buf.advance(2);
            return Ok(Some(Frame::Prompt));
        }
        if &buf[..] == b">" {
            return Ok(None);
        }
    }

    match buf.iter().position(|b| *b == b'\r' || *b == b'\n') {
        Some(end) => {
            let line = buf.split_to(end);
            let line = String::from_utf8_lossy(&line);
            Ok(Some(classify(line.trim_end())))
        }
        None if buf.len() > MAX_LINE_LEN => {
            let len = buf.len();
            buf.clear();
            Err(CodecError::LineTooLong(len))
        }
        None => Ok(None),
    }
}

/// Frame splitter fed by the reader task
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes held back waiting for a terminator
    buffer: BytesMut,
    prompt_expected: bool,
}

impl FrameDecoder {
    /// Empty decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            prompt_expected: false,
        }
    }

    /// Recognize the text-entry prompt until cleared again
    pub fn expect_prompt(&mut self, expected: bool) {
        self.prompt_expected = expected;
    }

    /// Buffer freshly read bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Next complete frame, if any
    ///
    /// Loop on this after every `extend`; one read can carry several frames.
    pub fn decode_next(&mut self) -> Result<Option<Frame>, CodecError> {
        decode(&mut self.buffer, self.prompt_expected)
    }

    /// Bytes not yet framed
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
