//! Per-file chunk assignment records.
//!
//! Written once when an uploader asks for placement, read back by
//! downloaders so they fetch from where chunks were actually sent even if
//! the ring has changed since.

use chunkmap_core::MemberId;
use serde::{Deserialize, Serialize};

/// Where one chunk of a file was assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAssignment {
    pub ordinal: u32,
    /// Key that was hashed onto the ring for this chunk.
    pub placement_key: String,
    pub member_id: MemberId,
}

/// Chunk index of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_id: String,
    pub chunk_count: u32,
    /// One entry per ordinal, in ordinal order.
    pub chunks: Vec<ChunkAssignment>,
}

impl FileMetadata {
    /// Member holding chunk `ordinal`, if the file has that many chunks.
    pub fn member_for(&self, ordinal: u32) -> Option<&MemberId> {
        self.chunks
            .get(ordinal as usize)
            .map(|chunk| &chunk.member_id)
    }
}
