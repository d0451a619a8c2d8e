/// Tuning for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters of context carried from the previous chunk.
    pub overlap: usize,
    /// Also write `chunks_{stem}.jsonl` interchange files next to the store.
    pub export_chunks: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 50,
            export_chunks: false,
        }
    }
}
