use serde::{Deserialize, Serialize};

/// One scraped document section as produced by the upstream scrapers.
///
/// All fields default so partially filled records still parse; a record
/// without content is skipped during ingestion rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DocumentRecord {
    pub id: String,
    pub file_name: String,
    pub section_index: u32,
    pub content: String,
    pub scraped_date: String,
}
