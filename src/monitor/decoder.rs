// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Line decoding with end-of-text detection.
//!
//! The decoder looks ahead in its read buffer for the next newline or
//! sentinel byte instead of reading one byte and rewinding. Raw bytes are
//! accumulated until a line is complete and only then decoded, so a
//! multi-byte UTF-8 character split across two reads is never mangled, and
//! since the sentinel is a single ASCII control byte it cannot straddle a
//! read boundary either.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// ASCII "end of text"; the remote script writes it to signal completion.
pub const END_OF_TEXT: u8 = 0x03;

/// Default cap on a single line before it is published in pieces.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// What the decoder found next in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete line without its terminator.
    Line(String),
    /// The sentinel byte was reached; nothing after it is read.
    Sentinel,
    /// The stream ended without a sentinel.
    EndOfStream,
}

pub struct LineDecoder<R> {
    reader: BufReader<R>,
    /// Bytes of the line being assembled. Kept across calls so
    /// `next_event` is cancel safe.
    pending: Vec<u8>,
    max_line_bytes: usize,
    sentinel: u8,
}

impl<R: AsyncRead + Unpin> LineDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            sentinel: END_OF_TEXT,
        }
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    pub fn with_sentinel(mut self, sentinel: u8) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// Decode the next line, or report the sentinel or end of stream.
    ///
    /// Text preceding a sentinel on the same line is returned as a line
    /// first; the following call then reports [`LineEvent::Sentinel`].
    /// A line longer than the cap is returned in pieces of exactly the cap,
    /// without stripping a trailing `\r` from any piece but the last.
    /// Cancel safe: dropping the future loses no bytes.
    pub async fn next_event(&mut self) -> io::Result<LineEvent> {
        loop {
            // Invariant: pending.len() < max_line_bytes here.
            let room = self.max_line_bytes - self.pending.len();
            let sentinel = self.sentinel;

            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.pending.is_empty() {
                    return Ok(LineEvent::EndOfStream);
                }
                return Ok(LineEvent::Line(self.take_line(true)));
            }

            // One byte past the room, so a terminator right at the cap still
            // ends the line instead of starting an empty one.
            let window = &available[..available.len().min(room + 1)];
            match window.iter().position(|&b| b == b'\n' || b == sentinel) {
                Some(pos) if window[pos] == b'\n' => {
                    self.pending.extend_from_slice(&window[..pos]);
                    self.reader.consume(pos + 1);
                    return Ok(LineEvent::Line(self.take_line(true)));
                }
                Some(pos) => {
                    self.pending.extend_from_slice(&window[..pos]);
                    if self.pending.is_empty() {
                        self.reader.consume(pos + 1);
                        return Ok(LineEvent::Sentinel);
                    }
                    // Leave the sentinel buffered for the next call.
                    self.reader.consume(pos);
                    return Ok(LineEvent::Line(self.take_line(true)));
                }
                None => {
                    let take = window.len().min(room);
                    self.pending.extend_from_slice(&window[..take]);
                    self.reader.consume(take);
                    if self.pending.len() >= self.max_line_bytes {
                        return Ok(LineEvent::Line(self.take_line(false)));
                    }
                }
            }
        }
    }

    fn take_line(&mut self, line_end: bool) -> String {
        if line_end && self.pending.last() == Some(&b'\r') {
            self.pending.pop();
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}
