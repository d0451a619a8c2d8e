use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Write},
    path::Path,
    sync::Arc,
};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    error::AppError,
    storage::{
        index::VectorIndex,
        types::{chunk::ChunkRecord, index_config::VectorIndexConfig},
    },
    utils::embedding::EmbeddingProvider,
};

pub const INDEX_FILE: &str = "index.bin";
pub const METADATA_FILE: &str = "metadata.jsonl";
pub const CONFIG_FILE: &str = "config.json";

/// Owns the vector index and its parallel metadata sequence.
///
/// Invariant: the vector at position `i` belongs to `metadata[i]`, in global
/// insertion order, across any number of `add_chunks` calls. Mutation goes
/// through `add_chunks` only.
///
/// Not internally synchronized: ingest with a single writer, then share
/// behind `Arc` read-only for query serving.
#[derive(Debug)]
pub struct VectorStore {
    provider: Arc<EmbeddingProvider>,
    index: Option<VectorIndex>,
    metadata: Vec<ChunkRecord>,
}

impl VectorStore {
    pub fn new(provider: Arc<EmbeddingProvider>) -> Self {
        Self {
            provider,
            index: None,
            metadata: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn provider(&self) -> &EmbeddingProvider {
        &self.provider
    }

    /// Embeds chunk contents and appends vectors plus metadata.
    ///
    /// The first call builds the index with the size policy applied to that
    /// batch; later calls append without re-clustering.
    pub async fn add_chunks(&mut self, chunks: Vec<ChunkRecord>) -> Result<usize, AppError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = self.provider.embed_batch(texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::Internal(format!(
                "embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        match &mut self.index {
            None => self.index = Some(VectorIndex::build(&embeddings)?),
            Some(index) => index.add(&embeddings)?,
        }

        let added = chunks.len();
        self.metadata.extend(chunks);

        debug!(
            added,
            total = self.metadata.len(),
            "chunks embedded and appended to vector store"
        );
        Ok(added)
    }

    /// Returns up to `k` `(chunk, distance)` pairs ascending by distance.
    ///
    /// Hits whose position falls outside the metadata bounds are silently
    /// dropped; that guards against a desynchronized index without failing
    /// the query.
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, AppError> {
        let index = self.index.as_ref().ok_or(AppError::EmptyStore)?;

        let query_embedding = self.provider.embed(query_text).await?;
        let hits = index.search(&query_embedding, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(position, distance)| {
                self.metadata
                    .get(position)
                    .map(|record| (record.clone(), distance))
            })
            .collect())
    }

    /// Persists index binary, newline-delimited metadata, and the config
    /// descriptor into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), AppError> {
        let index = self.index.as_ref().ok_or(AppError::EmptyStore)?;
        fs::create_dir_all(dir)?;

        index.save(&dir.join(INDEX_FILE))?;

        let mut metadata_file = File::create(dir.join(METADATA_FILE))?;
        for record in &self.metadata {
            let line = serde_json::to_string(record)?;
            metadata_file.write_all(line.as_bytes())?;
            metadata_file.write_all(b"\n")?;
        }

        let descriptor = VectorIndexConfig {
            model_name: self
                .provider
                .model_code()
                .unwrap_or_else(|| self.provider.backend_label().to_string()),
            embedding_dim: self.provider.dimension(),
            num_vectors: index.len(),
            num_chunks: self.metadata.len(),
            created_at: Utc::now(),
        };
        fs::write(
            dir.join(CONFIG_FILE),
            serde_json::to_string_pretty(&descriptor)?,
        )?;

        info!(
            dir = %dir.display(),
            num_vectors = descriptor.num_vectors,
            num_chunks = descriptor.num_chunks,
            "vector store saved"
        );
        Ok(())
    }

    /// Reconstructs a store saved by [`VectorStore::save`].
    ///
    /// Fails with [`AppError::IndexNotFound`] when index or metadata files
    /// are missing, and refuses a store whose persisted embedding dimension
    /// does not match the provider.
    pub fn load(dir: &Path, provider: Arc<EmbeddingProvider>) -> Result<Self, AppError> {
        let index_path = dir.join(INDEX_FILE);
        let metadata_path = dir.join(METADATA_FILE);
        if !index_path.exists() || !metadata_path.exists() {
            return Err(AppError::IndexNotFound(dir.display().to_string()));
        }

        let index = VectorIndex::load(&index_path)?;
        if index.dimension() != provider.dimension() {
            return Err(AppError::Validation(format!(
                "persisted index dimension {} does not match embedding provider dimension {}",
                index.dimension(),
                provider.dimension()
            )));
        }

        let mut metadata = Vec::new();
        let reader = BufReader::new(File::open(&metadata_path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            metadata.push(serde_json::from_str::<ChunkRecord>(&line)?);
        }

        if metadata.len() != index.len() {
            return Err(AppError::Validation(format!(
                "metadata length {} does not match vector count {}",
                metadata.len(),
                index.len()
            )));
        }

        match read_descriptor(dir) {
            Ok(Some(descriptor)) => {
                if descriptor.embedding_dim != provider.dimension() {
                    return Err(AppError::Validation(format!(
                        "persisted embedding dimension {} does not match configured provider dimension {}",
                        descriptor.embedding_dim,
                        provider.dimension()
                    )));
                }
                info!(
                    dir = %dir.display(),
                    model_name = %descriptor.model_name,
                    num_chunks = descriptor.num_chunks,
                    "vector store loaded"
                );
            }
            Ok(None) => {
                warn!(dir = %dir.display(), "vector store has no config descriptor");
            }
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "vector store config descriptor unreadable");
            }
        }

        Ok(Self {
            provider,
            index: Some(index),
            metadata,
        })
    }
}

fn read_descriptor(dir: &Path) -> Result<Option<VectorIndexConfig>, AppError> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}
