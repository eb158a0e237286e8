//! Sending side of the chunked transfer engine

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use peersync_core::config::TransferConfig;
use peersync_core::domain::messages::{ChunkData, TransferMetadata};
use peersync_core::domain::newtypes::FileId;
use peersync_hash::digest;

use crate::TransferError;

/// Chunk payload size used when no configuration is supplied
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Where outgoing chunk frames go
///
/// Production sinks forward frames to the peer data channel; tests
/// collect them in memory.
#[async_trait]
pub trait ChunkSink: Send {
    /// Delivers one chunk frame
    async fn send_chunk(&mut self, chunk: ChunkData) -> Result<(), TransferError>;
}

/// Splits file content into sequenced chunk frames
pub struct ChunkSender {
    chunk_size: usize,
}

impl ChunkSender {
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.chunk_size_kib as usize * 1024)
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Builds the announcement record for a file about to be sent
    ///
    /// The digest covers the full content, so the receiver can verify
    /// the reassembled bytes end to end.
    #[must_use]
    pub fn describe(&self, file_id: FileId, file_name: &str, content: &[u8]) -> TransferMetadata {
        TransferMetadata {
            file_id,
            file_name: file_name.to_string(),
            total_bytes: content.len() as u64,
            chunk_size: self.chunk_size as u64,
            hash: digest(content),
        }
    }

    /// Streams `content` into `sink` as sequenced chunks
    ///
    /// Sequence numbers start at zero and exactly the final frame
    /// carries `is_last_chunk`. An empty file still produces one empty
    /// final frame so the receiver can complete the transfer.
    ///
    /// Returns the number of chunks delivered.
    ///
    /// # Errors
    /// Returns `TransferError::Cancelled` when the token fires between
    /// chunks, or the sink's own error.
    #[tracing::instrument(skip(self, content, sink, cancel), fields(file_id = %file_id, bytes = content.len()))]
    pub async fn send<S: ChunkSink>(
        &self,
        file_id: FileId,
        content: &[u8],
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        let total_chunks = chunk_count(content.len() as u64, self.chunk_size as u64);

        for (sequence, payload) in chunk_payloads(content, self.chunk_size).enumerate() {
            if cancel.is_cancelled() {
                debug!(sent = sequence, "Transfer cancelled mid-stream");
                return Err(TransferError::Cancelled(file_id));
            }
            let sequence = sequence as u64;
            sink.send_chunk(ChunkData {
                sequence_number: sequence,
                file_id,
                data: payload.to_vec(),
                is_last_chunk: sequence + 1 == total_chunks,
            })
            .await?;
        }

        info!(chunks = total_chunks, "File content sent");
        Ok(total_chunks)
    }
}

impl Default for ChunkSender {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

/// Chunks needed for `total_bytes` of content; an empty file still
/// takes one frame
#[must_use]
pub fn chunk_count(total_bytes: u64, chunk_size: u64) -> u64 {
    if total_bytes == 0 {
        1
    } else {
        total_bytes.div_ceil(chunk_size)
    }
}

fn chunk_payloads(content: &[u8], chunk_size: usize) -> Box<dyn Iterator<Item = &[u8]> + Send + '_> {
    if content.is_empty() {
        Box::new(std::iter::once(&content[..]))
    } else {
        Box::new(content.chunks(chunk_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CollectingSink {
        chunks: Vec<ChunkData>,
    }

    impl CollectingSink {
        fn new() -> Self {
            Self { chunks: Vec::new() }
        }
    }

    #[async_trait]
    impl ChunkSink for CollectingSink {
        async fn send_chunk(&mut self, chunk: ChunkData) -> Result<(), TransferError> {
            self.chunks.push(chunk);
            Ok(())
        }
    }

    #[test]
    fn test_chunk_count_is_ceiling_division() {
        assert_eq!(chunk_count(0, 4), 1);
        assert_eq!(chunk_count(1, 4), 1);
        assert_eq!(chunk_count(4, 4), 1);
        assert_eq!(chunk_count(5, 4), 2);
        assert_eq!(chunk_count(8, 4), 2);
        assert_eq!(chunk_count(9, 4), 3);
    }

    #[tokio::test]
    async fn test_send_produces_contiguous_sequence_with_single_last_flag() {
        let sender = ChunkSender::new(4);
        let mut sink = CollectingSink::new();
        let content = b"0123456789"; // 10 bytes, 3 chunks of 4

        let sent = sender
            .send(FileId::new(), content, &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sent, 3);
        let sequences: Vec<u64> = sink.chunks.iter().map(|c| c.sequence_number).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        let last_flags: Vec<bool> = sink.chunks.iter().map(|c| c.is_last_chunk).collect();
        assert_eq!(last_flags, vec![false, false, true]);
        assert_eq!(sink.chunks[2].data, b"89");
    }

    #[tokio::test]
    async fn test_empty_file_sends_one_empty_final_chunk() {
        let sender = ChunkSender::new(4);
        let mut sink = CollectingSink::new();

        let sent = sender
            .send(FileId::new(), b"", &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sent, 1);
        assert!(sink.chunks[0].data.is_empty());
        assert!(sink.chunks[0].is_last_chunk);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_trailing_empty_chunk() {
        let sender = ChunkSender::new(4);
        let mut sink = CollectingSink::new();

        let sent = sender
            .send(FileId::new(), b"abcdefgh", &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sent, 2);
        assert_eq!(sink.chunks[1].data, b"efgh");
        assert!(sink.chunks[1].is_last_chunk);
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_stream() {
        let sender = ChunkSender::new(4);
        let mut sink = CollectingSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let file_id = FileId::new();
        let err = sender
            .send(file_id, b"0123456789", &mut sink, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, TransferError::Cancelled(file_id));
        assert!(sink.chunks.is_empty());
    }

    #[test]
    fn test_describe_announces_size_and_digest() {
        let sender = ChunkSender::new(4);
        let metadata = sender.describe(FileId::new(), "notes.txt", b"abc");

        assert_eq!(metadata.total_bytes, 3);
        assert_eq!(metadata.chunk_size, 4);
        assert_eq!(metadata.file_name, "notes.txt");
        assert_eq!(metadata.hash, digest(b"abc"));
    }

    #[test]
    fn test_from_config_converts_kib() {
        let sender = ChunkSender::from_config(&TransferConfig::default());
        assert_eq!(sender.chunk_size(), 1024 * 1024);
    }
}
