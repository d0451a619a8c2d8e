use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted descriptor written next to the index binary and metadata.
///
/// Informational at load except `embedding_dim`, which must match the
/// configured embedding provider before a saved store is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    pub model_name: String,
    pub embedding_dim: usize,
    pub num_vectors: usize,
    pub num_chunks: usize,
    pub created_at: DateTime<Utc>,
}
