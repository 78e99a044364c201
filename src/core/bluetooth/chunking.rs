//! Chunk envelope for length-limited characteristic writes.
//!
//! A message longer than the robot's transfer limit is cut into bodies of at most
//! `max_chunk_size` characters and tagged so the firmware can stitch it back together:
//!
//! ```text
//! chunk 1:    <body>#<N>$
//! chunk 2..N: <body>$
//! ```
//!
//! A message that fits in one chunk is sent bare.

use std::num::NonZeroUsize;

/// Separates the first body from the total chunk count.
pub const COUNT_MARKER: char = '#';

/// Terminates every chunk of a multi-chunk message.
pub const CHUNK_TERMINATOR: char = '$';

/// Split `message` into tagged chunks, left to right, without dropping characters.
///
/// Lengths are counted in `char`s, so a multi-byte character is never cut in half.
pub fn split_message(message: &str, max_chunk_size: NonZeroUsize) -> Vec<String> {
    let max = max_chunk_size.get();
    let chars: Vec<char> = message.chars().collect();

    let mut chunks: Vec<String> = chars
        .chunks(max)
        .map(|body| body.iter().collect::<String>())
        .collect();

    if chunks.is_empty() {
        // An empty message is still one (empty) write.
        chunks.push(String::new());
    }

    let total = chunks.len();
    if total > 1 {
        for (index, chunk) in chunks.iter_mut().enumerate() {
            if index == 0 {
                chunk.push(COUNT_MARKER);
                chunk.push_str(&total.to_string());
            }
            chunk.push(CHUNK_TERMINATOR);
        }
    }

    chunks
}

/// Receiver-side reassembly of a chunk sequence, as the robot firmware does it.
///
/// Multi-chunk messages reassemble exactly whatever their content, since only the last `#` of the
/// first chunk and the final `$` of each chunk are envelope. A bare single-chunk message that
/// itself ends in `#<digits>$` (e.g. `x#1$`) cannot be told apart from a header and is read as one.
#[derive(Debug, Default)]
pub struct ChunkReassembler {
    buffer: String,
    expected: Option<usize>,
    received: usize,
}

impl ChunkReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one written chunk.
    ///
    /// Returns `Some(message)` once the message is complete, `None` while more chunks are expected.
    /// A chunk that carries no terminator while nothing is pending is a complete bare message.
    pub fn feed(&mut self, chunk: &str) -> Option<String> {
        let Some(body) = chunk.strip_suffix(CHUNK_TERMINATOR) else {
            self.reset();
            return Some(chunk.to_string());
        };

        if self.expected.is_none() {
            if let Some((first_body, count)) = body.rsplit_once(COUNT_MARKER) {
                if let Ok(total) = count.parse::<usize>() {
                    self.buffer.clear();
                    self.buffer.push_str(first_body);
                    self.expected = Some(total);
                    self.received = 1;
                    return self.complete_if_done();
                }
            }
            // Terminated chunk without a header; treat it as a bare message.
            return Some(chunk.to_string());
        }

        self.buffer.push_str(body);
        self.received += 1;
        self.complete_if_done()
    }

    /// True while a multi-chunk message is partially received.
    pub fn is_pending(&self) -> bool {
        self.expected.is_some()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected = None;
        self.received = 0;
    }

    fn complete_if_done(&mut self) -> Option<String> {
        match self.expected {
            Some(total) if self.received >= total => {
                let message = std::mem::take(&mut self.buffer);
                self.reset();
                Some(message)
            }
            _ => None,
        }
    }
}
