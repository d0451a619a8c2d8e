mod config;
mod context;
mod stages;
mod state;

pub use config::IngestionConfig;

use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::store::VectorStore,
    utils::embedding::EmbeddingProvider,
};
use tracing::info;

use self::{
    context::PipelineContext,
    stages::{chunk, index, load, persist},
    state::ready,
};

/// Counters for one completed ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub sources: usize,
    pub documents: usize,
    pub skipped_records: usize,
    pub chunks: usize,
}

/// Drives raw document files through chunking, embedding, indexing and
/// persistence in strict stage order.
#[derive(Debug)]
pub struct IngestionPipeline {
    config: IngestionConfig,
    store: VectorStore,
}

impl IngestionPipeline {
    pub fn new(
        provider: Arc<EmbeddingProvider>,
        config: IngestionConfig,
    ) -> Result<Self, AppError> {
        // Surface bad chunk bounds at construction, not mid-run.
        crate::chunker::Chunker::new(config.chunk_size, config.overlap)?;
        Ok(Self {
            config,
            store: VectorStore::new(provider),
        })
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn into_store(self) -> VectorStore {
        self.store
    }

    /// Ingests every `*.jsonl` file under `input_dir` and saves the vector
    /// store into `output_dir`.
    #[tracing::instrument(skip_all, fields(input_dir = %input_dir.display()))]
    pub async fn run(
        &mut self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<IngestionReport, AppError> {
        let mut ctx =
            PipelineContext::new(&self.config, &mut self.store, input_dir, output_dir);

        let machine = ready();
        let pipeline_started = Instant::now();

        let stage_start = Instant::now();
        let machine = load(machine, &mut ctx).map_err(|err| ctx.abort(err))?;
        let load_duration = stage_start.elapsed();

        let report_sources = ctx.sources.len();
        let report_documents = ctx.document_count();
        let report_skipped = ctx.skipped_count();

        let stage_start = Instant::now();
        let machine = chunk(machine, &mut ctx).map_err(|err| ctx.abort(err))?;
        let chunk_duration = stage_start.elapsed();

        let report_chunks = ctx.chunks.len();

        let stage_start = Instant::now();
        let machine = index(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;
        let index_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let _machine = persist(machine, &mut ctx).map_err(|err| ctx.abort(err))?;
        let persist_duration = stage_start.elapsed();

        info!(
            total_ms = duration_millis(pipeline_started.elapsed()),
            load_ms = duration_millis(load_duration),
            chunk_ms = duration_millis(chunk_duration),
            index_ms = duration_millis(index_duration),
            persist_ms = duration_millis(persist_duration),
            chunks = report_chunks,
            "ingestion pipeline finished"
        );

        Ok(IngestionReport {
            sources: report_sources,
            documents: report_documents,
            skipped_records: report_skipped,
            chunks: report_chunks,
        })
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
