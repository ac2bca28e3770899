//! # Flat-File Block Storage
//!
//! Blocks are appended to numbered files `blkNNNNN.dat`. Each record is
//! framed so a read can detect misdirected positions and torn writes:
//!
//! ```text
//! [magic: 4][payload_len: u32 LE][crc32(payload): u32 LE][payload]
//! ```
//!
//! A new file is started once the current one would exceed
//! `max_file_size`.

use crate::domain::errors::BlockFileError;
use crate::domain::value_objects::BlockPos;
use crate::ports::outbound::BlockFileStore;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const FRAME_HEADER: u32 = 12;

#[derive(Debug, Clone)]
pub struct FlatFileConfig {
    pub dir: PathBuf,
    pub magic: [u8; 4],
    /// Maximum size of one `blkNNNNN.dat` (default: 128MB)
    pub max_file_size: u32,
    /// fsync after every append (default: true for durability)
    pub sync_writes: bool,
}

impl FlatFileConfig {
    pub fn new(dir: impl Into<PathBuf>, magic: [u8; 4]) -> Self {
        Self {
            dir: dir.into(),
            magic,
            max_file_size: 128 * 1024 * 1024,
            sync_writes: true,
        }
    }

    /// Small files, no fsync.
    pub fn for_testing(dir: impl Into<PathBuf>) -> Self {
        Self {
            max_file_size: 64 * 1024,
            sync_writes: false,
            ..Self::new(dir, *b"test")
        }
    }
}

struct WriterState {
    file: u32,
    size: u32,
}

pub struct FlatFileBlockStore {
    config: FlatFileConfig,
    writer: Mutex<WriterState>,
}

impl FlatFileBlockStore {
    pub fn open(config: FlatFileConfig) -> Result<Self, BlockFileError> {
        std::fs::create_dir_all(&config.dir)?;

        // Resume appending to the highest-numbered existing file.
        let mut file = 0u32;
        while Self::file_path(&config.dir, file + 1).exists() {
            file += 1;
        }
        let path = Self::file_path(&config.dir, file);
        let size = match std::fs::metadata(&path) {
            Ok(meta) => meta.len() as u32,
            Err(_) => 0,
        };

        tracing::info!(
            "[pc-02] 📦 Block files at {} (current blk{:05}.dat, {} bytes)",
            config.dir.display(),
            file,
            size
        );

        Ok(Self {
            config,
            writer: Mutex::new(WriterState { file, size }),
        })
    }

    fn file_path(dir: &Path, file: u32) -> PathBuf {
        dir.join(format!("blk{:05}.dat", file))
    }
}

impl BlockFileStore for FlatFileBlockStore {
    fn append(&self, bytes: &[u8]) -> Result<BlockPos, BlockFileError> {
        let mut writer = self.writer.lock();
        let record_len = FRAME_HEADER + bytes.len() as u32;
        if writer.size > 0 && writer.size.saturating_add(record_len) > self.config.max_file_size {
            writer.file += 1;
            writer.size = 0;
        }

        let mut frame = Vec::with_capacity(record_len as usize);
        frame.extend_from_slice(&self.config.magic);
        frame.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(bytes).to_le_bytes());
        frame.extend_from_slice(bytes);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(Self::file_path(&self.config.dir, writer.file))?;
        file.write_all(&frame)?;
        if self.config.sync_writes {
            file.sync_data()?;
        }

        let pos = BlockPos::new(writer.file, writer.size, bytes.len() as u32);
        writer.size += record_len;
        Ok(pos)
    }

    fn read(&self, pos: &BlockPos) -> Result<Vec<u8>, BlockFileError> {
        let mut file = File::open(Self::file_path(&self.config.dir, pos.file))?;
        file.seek(SeekFrom::Start(u64::from(pos.offset)))?;

        let mut header = [0u8; FRAME_HEADER as usize];
        file.read_exact(&mut header)?;
        if header[..4] != self.config.magic {
            return Err(BlockFileError::BadRecord {
                pos: *pos,
                reason: "magic mismatch",
            });
        }
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len != pos.len {
            return Err(BlockFileError::BadRecord {
                pos: *pos,
                reason: "length mismatch",
            });
        }
        let expected = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        let mut payload = vec![0u8; len as usize];
        file.read_exact(&mut payload)?;
        let actual = crc32fast::hash(&payload);
        if actual != expected {
            return Err(BlockFileError::ChecksumMismatch {
                pos: *pos,
                expected,
                actual,
            });
        }
        Ok(payload)
    }

    fn flush(&self) -> Result<(), BlockFileError> {
        let writer = self.writer.lock();
        let path = Self::file_path(&self.config.dir, writer.file);
        if path.exists() {
            File::open(path)?.sync_all()?;
        }
        Ok(())
    }
}
