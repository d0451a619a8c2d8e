use std::path::{Path, PathBuf};

use common::{
    error::AppError,
    storage::{
        store::VectorStore,
        types::{chunk::ChunkRecord, document::DocumentRecord},
    },
};
use tracing::error;

use super::config::IngestionConfig;

/// One source file's records, keyed by its stem for chunk ids.
pub struct SourceBatch {
    pub stem: String,
    pub file_name: String,
    pub records: Vec<DocumentRecord>,
    pub skipped_lines: usize,
}

/// Mutable state threaded through the ingestion stages.
pub struct PipelineContext<'a> {
    pub config: &'a IngestionConfig,
    pub store: &'a mut VectorStore,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sources: Vec<SourceBatch>,
    pub chunks: Vec<ChunkRecord>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        config: &'a IngestionConfig,
        store: &'a mut VectorStore,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Self {
        Self {
            config,
            store,
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            sources: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn document_count(&self) -> usize {
        self.sources.iter().map(|s| s.records.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.sources.iter().map(|s| s.skipped_lines).sum()
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            input_dir = %self.input_dir.display(),
            error = %err,
            "ingestion pipeline aborted"
        );
        err
    }
}
