//! Chunked message transport
//! Writes text commands to the robot's characteristic, splitting them when the robot
//! has a transfer limit. Chunks are written one at a time, each awaited before the next.

use std::num::NonZeroUsize;

use anyhow::Result;
use log::{debug, error, warn};

use crate::core::bluetooth::chunking::split_message;

/// A characteristic that accepts writes
#[async_trait::async_trait]
pub trait CharacteristicWriter: Send + Sync {
    /// Whether the characteristic reports write support
    async fn can_write(&self) -> bool;

    /// Write one value and wait for the write to complete
    async fn write_value(&self, value: &[u8]) -> Result<()>;
}

/// Outcome of a transport send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Every chunk was written
    Sent { chunks: usize },
    /// The characteristic does not support writes; nothing was written
    Skipped,
}

/// Sends messages over a [`CharacteristicWriter`].
pub struct ChunkedTransport;

impl ChunkedTransport {
    /// Send `message`, chunked when `max_chunk_size` is set.
    ///
    /// A failed write aborts the remaining chunks and returns the error; the chunks already written
    /// stay written.
    pub async fn send<W>(
        message: &str,
        max_chunk_size: Option<NonZeroUsize>,
        writer: &W,
    ) -> Result<SendOutcome>
    where
        W: CharacteristicWriter + ?Sized,
    {
        if !writer.can_write().await {
            warn!("Characteristic does not support write, dropping message: {}", message);
            return Ok(SendOutcome::Skipped);
        }

        let chunks = match max_chunk_size {
            Some(max) => split_message(message, max),
            None => vec![message.to_string()],
        };
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            if let Err(e) = writer.write_value(chunk.as_bytes()).await {
                error!("Error sending message: {}", e);
                return Err(e.context(format!(
                    "Failed to write chunk {} of {}",
                    index + 1,
                    total
                )));
            }
            debug!("Message sent: {}", chunk);
        }

        Ok(SendOutcome::Sent { chunks: total })
    }

    /// Send `text` in a single write, whatever its length.
    pub async fn send_text<W>(text: &str, writer: &W) -> Result<SendOutcome>
    where
        W: CharacteristicWriter + ?Sized,
    {
        Self::send(text, None, writer).await
    }
}

/// Writer over a bluest characteristic
#[derive(Clone)]
pub struct BluestWriter {
    write_char: bluest::Characteristic,
}

impl BluestWriter {
    pub fn new(write_char: bluest::Characteristic) -> Self {
        Self { write_char }
    }
}

#[async_trait::async_trait]
impl CharacteristicWriter for BluestWriter {
    async fn can_write(&self) -> bool {
        match self.write_char.properties().await {
            Ok(properties) => properties.write,
            Err(e) => {
                warn!("Failed to read characteristic properties: {}", e);
                false
            }
        }
    }

    async fn write_value(&self, value: &[u8]) -> Result<()> {
        self.write_char.write(value).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory characteristic recording every write
    #[derive(Default)]
    pub(crate) struct RecordingWriter {
        pub writes: Mutex<Vec<String>>,
        pub read_only: bool,
        pub fail_on: Option<usize>,
        /// Number of upcoming writes that fail before writes succeed again
        pub failures_left: AtomicUsize,
    }

    impl RecordingWriter {
        pub fn written(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CharacteristicWriter for RecordingWriter {
        async fn can_write(&self) -> bool {
            !self.read_only
        }

        async fn write_value(&self, value: &[u8]) -> Result<()> {
            let mut writes = self.writes.lock().unwrap();
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing || self.fail_on == Some(writes.len()) {
                return Err(anyhow!("GATT operation failed"));
            }
            writes.push(String::from_utf8(value.to_vec())?);
            Ok(())
        }
    }

    #[tokio::test]
    async fn unchunked_message_is_one_write() {
        let writer = RecordingWriter::default();
        let message = r#"{"type":"control","direction":"N"}"#;
        let outcome = ChunkedTransport::send(message, None, &writer).await.unwrap();
        assert_eq!(outcome, SendOutcome::Sent { chunks: 1 });
        assert_eq!(writer.written(), vec![message.to_string()]);
    }

    #[tokio::test]
    async fn chunks_are_written_in_order() {
        let writer = RecordingWriter::default();
        ChunkedTransport::send("abcdefgh", NonZeroUsize::new(3), &writer)
            .await
            .unwrap();
        assert_eq!(writer.written(), ["abc#3$", "def$", "gh$"]);
    }

    #[tokio::test]
    async fn read_only_characteristic_is_a_no_op() {
        let writer = RecordingWriter {
            read_only: true,
            ..Default::default()
        };
        let outcome = ChunkedTransport::send("F", None, &writer).await.unwrap();
        assert_eq!(outcome, SendOutcome::Skipped);
        assert!(writer.written().is_empty());
    }

    #[tokio::test]
    async fn failed_write_aborts_remaining_chunks() {
        let writer = RecordingWriter {
            fail_on: Some(1),
            ..Default::default()
        };
        let err = ChunkedTransport::send("abcdefgh", NonZeroUsize::new(3), &writer)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chunk 2 of 3"), "{err}");
        assert_eq!(writer.written(), ["abc#3$"]);
    }
}
