use common::error::AppError;
use state_machines::core::GuardError;
use tracing::{debug, info, instrument, warn};

use crate::{
    assembly::assemble_chunks,
    chunker::Chunker,
    reader::{list_jsonl_files, read_document_records, write_chunk_records},
};

use super::{
    context::{PipelineContext, SourceBatch},
    state::{Chunked, Indexed, IngestionMachine, Loaded, Persisted, Ready},
};

#[instrument(level = "trace", skip_all, fields(input_dir = %ctx.input_dir.display()))]
pub fn load(
    machine: IngestionMachine<(), Ready>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Loaded>, AppError> {
    let files = list_jsonl_files(&ctx.input_dir)?;
    if files.is_empty() {
        warn!(input_dir = %ctx.input_dir.display(), "no document files found");
    }

    for path in files {
        let outcome = read_document_records(&path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("source")
            .to_string();
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("source.jsonl")
            .to_string();

        debug!(
            source = %stem,
            records = outcome.records.len(),
            skipped = outcome.skipped_lines,
            "document source loaded"
        );
        ctx.sources.push(SourceBatch {
            stem,
            file_name,
            records: outcome.records,
            skipped_lines: outcome.skipped_lines,
        });
    }

    info!(
        sources = ctx.sources.len(),
        documents = ctx.document_count(),
        skipped = ctx.skipped_count(),
        "document loading finished"
    );

    machine
        .load()
        .map_err(|(_, guard)| map_guard_error("load", &guard))
}

#[instrument(level = "trace", skip_all)]
pub fn chunk(
    machine: IngestionMachine<(), Loaded>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Chunked>, AppError> {
    let chunker = Chunker::new(ctx.config.chunk_size, ctx.config.overlap)?;

    for source in &ctx.sources {
        let chunks = assemble_chunks(&source.stem, &source.file_name, &source.records, &chunker);
        if ctx.config.export_chunks {
            let export_path = ctx.output_dir.join(format!("chunks_{}.jsonl", source.stem));
            std::fs::create_dir_all(&ctx.output_dir)?;
            write_chunk_records(&export_path, &chunks)?;
        }
        ctx.chunks.extend(chunks);
    }

    info!(chunks = ctx.chunks.len(), "chunking finished");

    machine
        .chunk()
        .map_err(|(_, guard)| map_guard_error("chunk", &guard))
}

#[instrument(level = "trace", skip_all)]
pub async fn index(
    machine: IngestionMachine<(), Chunked>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Indexed>, AppError> {
    let chunks = std::mem::take(&mut ctx.chunks);
    let added = ctx.store.add_chunks(chunks).await?;

    info!(vectors = added, "embedding and indexing finished");

    machine
        .index()
        .map_err(|(_, guard)| map_guard_error("index", &guard))
}

#[instrument(level = "trace", skip_all, fields(output_dir = %ctx.output_dir.display()))]
pub fn persist(
    machine: IngestionMachine<(), Indexed>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Persisted>, AppError> {
    ctx.store.save(&ctx.output_dir)?;

    machine
        .persist()
        .map_err(|(_, guard)| map_guard_error("persist", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::Internal(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
}
