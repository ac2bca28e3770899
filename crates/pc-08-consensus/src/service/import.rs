//! # Bulk Import
//!
//! Reads a stream of framed blocks and feeds them through
//! [`ChainState::process_block`]:
//!
//! ```text
//! ┌──────────┬────────────┬──────────────────────┐
//! │ magic 4B │ len u32 LE │ consensus-encoded blk │ …
//! └──────────┴────────────┴──────────────────────┘
//! ```
//!
//! Bytes that do not start with the network magic are skipped until the
//! next magic. The interrupt flag is checked between blocks.

use super::{BlockStatus, ChainState};
use crate::domain::{ChainError, ChainResult};
use shared_types::{Block, Decodable, DosScore, Encodable};
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};

/// What an import run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub read: usize,
    pub accepted: usize,
    pub orphaned: usize,
    pub rejected: usize,
    pub interrupted: bool,
}

/// Frames `block` for an import stream.
pub fn encode_block_record(magic: [u8; 4], block: &Block) -> Vec<u8> {
    let payload = block.encode();
    let mut record = Vec::with_capacity(8 + payload.len());
    record.extend_from_slice(&magic);
    record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    record.extend_from_slice(&payload);
    record
}

/// Iterator over the blocks of a framed stream.
pub struct BlockStreamReader<R> {
    reader: R,
    magic: [u8; 4],
    max_len: usize,
}

impl<R: Read> BlockStreamReader<R> {
    pub fn new(reader: R, magic: [u8; 4], max_len: usize) -> Self {
        Self {
            reader,
            magic,
            max_len,
        }
    }

    /// Reads one byte; `None` at end of stream.
    fn read_byte(&mut self) -> ChainResult<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ChainError::Import(e.to_string())),
            }
        }
    }

    /// Advances past the next magic; false at end of stream.
    fn seek_magic(&mut self) -> ChainResult<bool> {
        let mut window = [0u8; 4];
        let mut filled = 0usize;
        let mut skipped = 0usize;
        loop {
            let Some(byte) = self.read_byte()? else {
                return Ok(false);
            };
            if filled < 4 {
                window[filled] = byte;
                filled += 1;
            } else {
                window.rotate_left(1);
                window[3] = byte;
                skipped += 1;
            }
            if filled == 4 && window == self.magic {
                if skipped > 0 {
                    tracing::debug!("[pc-08] Import skipped {} bytes before a record", skipped);
                }
                return Ok(true);
            }
        }
    }

    fn next_block(&mut self) -> ChainResult<Option<Block>> {
        if !self.seek_magic()? {
            return Ok(None);
        }
        let mut len = [0u8; 4];
        self.reader
            .read_exact(&mut len)
            .map_err(|e| ChainError::Import(e.to_string()))?;
        let len = u32::from_le_bytes(len) as usize;
        if len > self.max_len {
            return Err(ChainError::Import(format!("record of {} bytes exceeds {}", len, self.max_len)));
        }
        let mut payload = vec![0u8; len];
        self.reader
            .read_exact(&mut payload)
            .map_err(|e| ChainError::Import(e.to_string()))?;
        Ok(Some(Block::decode(&payload)?))
    }
}

impl<R: Read> Iterator for BlockStreamReader<R> {
    type Item = ChainResult<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}

impl ChainState {
    /// Processes `blocks` in order until exhausted or `interrupt` is set.
    /// Rejected blocks are counted and skipped; a local failure stops the
    /// import.
    pub fn import_blocks<I>(&mut self, blocks: I, interrupt: &AtomicBool) -> ChainResult<ImportSummary>
    where
        I: IntoIterator<Item = ChainResult<Block>>,
    {
        let mut summary = ImportSummary::default();
        for block in blocks {
            if interrupt.load(Ordering::SeqCst) {
                tracing::info!("[pc-08] Import interrupted after {} blocks", summary.read);
                summary.interrupted = true;
                break;
            }
            let block = block?;
            summary.read += 1;
            match self.process_block(block, None) {
                Ok(BlockStatus::Accepted { .. }) => summary.accepted += 1,
                Ok(BlockStatus::Orphan { .. }) => summary.orphaned += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(_) => summary.rejected += 1,
            }
        }
        tracing::info!(
            "[pc-08] Imported {} blocks ({} accepted, {} orphaned, {} rejected), best height {}",
            summary.read,
            summary.accepted,
            summary.orphaned,
            summary.rejected,
            self.best_height()
        );
        Ok(summary)
    }

    /// Imports a framed block stream in this network's magic.
    pub fn import_stream<R: Read>(&mut self, reader: R, interrupt: &AtomicBool) -> ChainResult<ImportSummary> {
        let stream = BlockStreamReader::new(reader, self.params.magic, self.params.max_block_size);
        self.import_blocks(stream, interrupt)
    }
}
