use common::storage::types::{chunk::ChunkRecord, document::DocumentRecord};
use tracing::debug;

use crate::chunker::Chunker;

/// Turns one source file's document records into chunk records with
/// provenance metadata.
///
/// Chunk ids are `{source_stem}_chunk_{counter}` with the counter scoped to
/// the source and incremented across all of its documents, so re-running
/// ingestion over the same input yields identical ids. Records with empty
/// content are skipped.
pub fn assemble_chunks(
    source_stem: &str,
    source_file_name: &str,
    records: &[DocumentRecord],
    chunker: &Chunker,
) -> Vec<ChunkRecord> {
    let mut chunks = Vec::new();
    let mut counter = 0usize;

    for record in records {
        if record.content.is_empty() {
            continue;
        }

        for (chunk_index, content) in chunker.chunk(&record.content).into_iter().enumerate() {
            chunks.push(ChunkRecord {
                chunk_id: format!("{source_stem}_chunk_{counter}"),
                original_file: if record.file_name.is_empty() {
                    source_file_name.to_string()
                } else {
                    record.file_name.clone()
                },
                section_index: record.section_index,
                chunk_index: u32::try_from(chunk_index).unwrap_or(u32::MAX),
                content,
                scraped_date: record.scraped_date.clone(),
                original_id: record.id.clone(),
            });
            counter += 1;
        }
    }

    debug!(
        source = source_stem,
        documents = records.len(),
        chunks = chunks.len(),
        "assembled chunk records"
    );
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, content: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.into(),
            file_name: "loans.txt".into(),
            section_index: 1,
            content: content.into(),
            scraped_date: "2024-05-01".into(),
        }
    }

    #[test]
    fn ids_are_sequential_across_documents_of_one_source() {
        let chunker = Chunker::new(512, 50).unwrap();
        let records = vec![
            record("a", "Short section about home loans."),
            record("b", "Short section about gold loans."),
        ];
        let chunks = assemble_chunks("loans", "loans.jsonl", &records, &chunker);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.first().map(|c| c.chunk_id.as_str()), Some("loans_chunk_0"));
        assert_eq!(chunks.get(1).map(|c| c.chunk_id.as_str()), Some("loans_chunk_1"));
        assert_eq!(chunks.get(1).map(|c| c.chunk_index), Some(0));
        assert_eq!(chunks.get(1).map(|c| c.original_id.as_str()), Some("b"));
    }

    #[test]
    fn empty_content_records_are_skipped() {
        let chunker = Chunker::new(512, 50).unwrap();
        let records = vec![record("a", ""), record("b", "Some content.")];
        let chunks = assemble_chunks("loans", "loans.jsonl", &records, &chunker);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks.first().map(|c| c.original_id.as_str()), Some("b"));
    }

    #[test]
    fn missing_file_name_falls_back_to_source_file() {
        let chunker = Chunker::new(512, 50).unwrap();
        let records = vec![DocumentRecord {
            content: "Some content.".into(),
            ..DocumentRecord::default()
        }];
        let chunks = assemble_chunks("loans", "loans.jsonl", &records, &chunker);
        assert_eq!(
            chunks.first().map(|c| c.original_file.as_str()),
            Some("loans.jsonl")
        );
    }

    #[test]
    fn multi_chunk_documents_count_chunk_index_from_zero() {
        let chunker = Chunker::new(40, 8).unwrap();
        let records = vec![record(
            "a",
            "First sentence about interest rates here. Second sentence about margin rules. Third sentence about tenure limits.",
        )];
        let chunks = assemble_chunks("loans", "loans.jsonl", &records, &chunker);
        assert!(chunks.len() > 1);
        let indexes: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        let expected: Vec<u32> = (0..chunks.len() as u32).collect();
        assert_eq!(indexes, expected);
    }
}
