//! Receiving side of the chunked transfer engine
//!
//! Chunks normally arrive in order on a reliable channel, but the
//! assembler tolerates reordering and duplication anyway: frames ahead
//! of the contiguous prefix are parked by sequence number and drained
//! as the gap closes. A transfer completes only when the final chunk
//! and every predecessor have arrived and the reassembled bytes match
//! the announced size and digest.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use peersync_core::domain::messages::{ChunkData, TransferMetadata};
use peersync_core::domain::newtypes::FileId;
use peersync_hash::ChunkedHasher;

use crate::TransferError;

/// Outcome of feeding one chunk to an assembler
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyStatus {
    /// More chunks are outstanding
    Incomplete {
        /// Bytes in the verified contiguous prefix
        bytes_received: u64,
    },
    /// All chunks arrived and the digest checked out
    Complete(Vec<u8>),
}

/// Reassembles one announced file from its chunk frames
pub struct ChunkAssembler {
    metadata: TransferMetadata,
    /// Contiguous prefix assembled so far
    assembled: Vec<u8>,
    next_sequence: u64,
    /// Frames that arrived ahead of the contiguous prefix
    parked: BTreeMap<u64, ChunkData>,
    /// Sequence number of the final chunk, once seen
    final_sequence: Option<u64>,
}

impl ChunkAssembler {
    #[must_use]
    pub fn new(metadata: TransferMetadata) -> Self {
        let assembled = Vec::with_capacity(metadata.total_bytes as usize);
        Self {
            metadata,
            assembled,
            next_sequence: 0,
            parked: BTreeMap::new(),
            final_sequence: None,
        }
    }

    #[must_use]
    pub fn file_id(&self) -> FileId {
        self.metadata.file_id
    }

    #[must_use]
    pub fn metadata(&self) -> &TransferMetadata {
        &self.metadata
    }

    /// Frames currently parked waiting for the gap to close
    #[must_use]
    pub fn parked_chunks(&self) -> usize {
        self.parked.len()
    }

    /// Feeds one chunk frame into the assembly
    ///
    /// # Errors
    /// Rejects frames for a different file, frames beyond the announced
    /// final chunk, and completed content whose size or digest does not
    /// match the announcement. After an integrity failure the buffers
    /// are released and the assembler is spent.
    pub fn accept(&mut self, chunk: ChunkData) -> Result<AssemblyStatus, TransferError> {
        if chunk.file_id != self.metadata.file_id {
            return Err(TransferError::UnexpectedFile {
                expected: self.metadata.file_id,
                got: chunk.file_id,
            });
        }

        if let Some(last) = self.final_sequence {
            if chunk.sequence_number > last {
                return Err(TransferError::ChunkAfterFinal {
                    sequence: chunk.sequence_number,
                });
            }
        }

        if chunk.is_last_chunk {
            self.final_sequence = Some(chunk.sequence_number);
            // A frame parked beyond the final sequence can never drain,
            // so surface it now instead of wedging the transfer.
            if let Some((&sequence, _)) = self.parked.range(chunk.sequence_number + 1..).next() {
                self.parked.clear();
                return Err(TransferError::ChunkAfterFinal { sequence });
            }
        }

        if chunk.sequence_number < self.next_sequence
            || self.parked.contains_key(&chunk.sequence_number)
        {
            debug!(
                file_id = %self.metadata.file_id,
                sequence = chunk.sequence_number,
                "Dropping duplicate chunk"
            );
        } else if chunk.sequence_number == self.next_sequence {
            self.append(chunk);
            self.drain_parked();
        } else {
            debug!(
                file_id = %self.metadata.file_id,
                sequence = chunk.sequence_number,
                awaiting = self.next_sequence,
                "Parking out-of-order chunk"
            );
            self.parked.insert(chunk.sequence_number, chunk);
        }

        if self.final_sequence == Some(self.next_sequence.saturating_sub(1))
            && self.next_sequence > 0
            && self.parked.is_empty()
        {
            return self.finish();
        }

        Ok(AssemblyStatus::Incomplete {
            bytes_received: self.assembled.len() as u64,
        })
    }

    fn append(&mut self, chunk: ChunkData) {
        self.assembled.extend_from_slice(&chunk.data);
        self.next_sequence += 1;
    }

    fn drain_parked(&mut self) {
        while let Some(chunk) = self.parked.remove(&self.next_sequence) {
            self.append(chunk);
        }
    }

    fn finish(&mut self) -> Result<AssemblyStatus, TransferError> {
        let content = std::mem::take(&mut self.assembled);
        self.parked.clear();

        if content.len() as u64 != self.metadata.total_bytes {
            warn!(
                file_id = %self.metadata.file_id,
                expected = self.metadata.total_bytes,
                actual = content.len(),
                "Reassembled size mismatch"
            );
            return Err(TransferError::SizeMismatch {
                expected: self.metadata.total_bytes,
                actual: content.len() as u64,
            });
        }

        let mut hasher = ChunkedHasher::new();
        hasher.update(&content);
        let actual = hasher.finalize();
        if actual != self.metadata.hash {
            warn!(file_id = %self.metadata.file_id, "Content digest mismatch, rejecting artifact");
            return Err(TransferError::IntegrityMismatch {
                expected: self.metadata.hash.clone(),
                actual,
            });
        }

        info!(
            file_id = %self.metadata.file_id,
            bytes = content.len(),
            "File reassembled and verified"
        );
        Ok(AssemblyStatus::Complete(content))
    }
}

/// All in-flight incoming transfers, keyed by file id
pub struct IncomingTransfers {
    transfers: DashMap<FileId, Arc<Mutex<ChunkAssembler>>>,
}

impl IncomingTransfers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transfers: DashMap::new(),
        }
    }

    /// Registers an announced transfer
    ///
    /// # Errors
    /// Returns `TransferError::AlreadyRegistered` when a transfer for
    /// the same file id is still in flight.
    pub fn begin(&self, metadata: TransferMetadata) -> Result<(), TransferError> {
        let file_id = metadata.file_id;
        match self.transfers.entry(file_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(TransferError::AlreadyRegistered(file_id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(ChunkAssembler::new(metadata))));
                Ok(())
            }
        }
    }

    /// Routes a chunk to its transfer
    ///
    /// A completed or failed transfer is dropped from the registry so
    /// its buffers are released either way.
    ///
    /// # Errors
    /// Returns `TransferError::UnknownTransfer` for unannounced file
    /// ids, plus any assembly error.
    pub async fn accept(&self, chunk: ChunkData) -> Result<AssemblyStatus, TransferError> {
        let file_id = chunk.file_id;
        let assembler = self
            .transfers
            .get(&file_id)
            .map(|entry| entry.clone())
            .ok_or(TransferError::UnknownTransfer(file_id))?;

        let status = assembler.lock().await.accept(chunk);
        match &status {
            Ok(AssemblyStatus::Complete(_)) | Err(_) => {
                self.transfers.remove(&file_id);
            }
            Ok(AssemblyStatus::Incomplete { .. }) => {}
        }
        status
    }

    /// Abandons an in-flight transfer, releasing its buffers
    pub fn cancel(&self, file_id: FileId) -> bool {
        self.transfers.remove(&file_id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

impl Default for IncomingTransfers {
    fn default() -> Self {
        Self::new()
    }
}
