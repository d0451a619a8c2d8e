#![allow(clippy::missing_docs_in_private_items)]

pub mod assembly;
pub mod chunker;
pub mod pipeline;
pub mod reader;

pub use chunker::Chunker;
pub use pipeline::{IngestionConfig, IngestionPipeline, IngestionReport};
