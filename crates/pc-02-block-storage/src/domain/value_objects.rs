use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of one block record: file number, byte offset of the record
/// frame, and payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub file: u32,
    pub offset: u32,
    pub len: u32,
}

impl BlockPos {
    pub fn new(file: u32, offset: u32, len: u32) -> Self {
        Self { file, offset, len }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blk{:05}.dat+{} ({} bytes)", self.file, self.offset, self.len)
    }
}

/// Exclusive upper bound of all keys starting with `prefix`, or `None`
/// when no such bound exists (all `0xff`).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
