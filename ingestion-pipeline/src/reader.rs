use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
};

use common::{
    error::AppError,
    storage::types::{chunk::ChunkRecord, document::DocumentRecord},
};
use tracing::warn;

/// Outcome of reading one newline-delimited document file.
#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub records: Vec<DocumentRecord>,
    /// Lines that failed to parse; logged and skipped, never fatal.
    pub skipped_lines: usize,
}

/// Reads document records from a JSONL file, one record per line.
///
/// Blank lines are ignored. Malformed lines are logged and skipped so a
/// single bad record never aborts the batch.
pub fn read_document_records(path: &Path) -> Result<ReadOutcome, AppError> {
    let reader = BufReader::new(File::open(path)?);
    let mut outcome = ReadOutcome::default();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DocumentRecord>(&line) {
            Ok(record) => outcome.records.push(record),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    line = line_number + 1,
                    error = %err,
                    "skipping malformed document record"
                );
                outcome.skipped_lines += 1;
            }
        }
    }

    Ok(outcome)
}

/// Writes chunk records in the newline-delimited interchange format.
pub fn write_chunk_records(path: &Path, chunks: &[ChunkRecord]) -> Result<(), AppError> {
    let mut file = File::create(path)?;
    for chunk in chunks {
        let line = serde_json::to_string(chunk)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

/// Lists `*.jsonl` files in a directory in sorted order.
pub fn list_jsonl_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, AppError> {
    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
        })
        .collect();
    files.sort();
    Ok(files)
}
