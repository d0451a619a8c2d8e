/// Tuning for query answering.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Passages retrieved per query.
    pub top_k: usize,
    /// Queries shorter than this (in characters), or without whitespace,
    /// are rewritten before retrieval.
    pub min_query_chars: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_query_chars: 5,
        }
    }
}
