use serde::{Deserialize, Serialize};

/// Bounded retrieval unit derived from a [`DocumentRecord`].
///
/// `chunk_id` is the source file stem plus a source-scoped sequential
/// counter; `chunk_index` is the position within the originating document.
///
/// [`DocumentRecord`]: super::document::DocumentRecord
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub original_file: String,
    pub section_index: u32,
    pub chunk_index: u32,
    pub content: String,
    pub scraped_date: String,
    pub original_id: String,
}
