#![allow(clippy::missing_docs_in_private_items)]

pub mod pipeline;
pub mod prompt;
pub mod scoring;

pub use pipeline::{
    services::{DefaultQueryServices, QueryServices},
    QueryConfig, QueryOutcome, QueryPipeline, RetrievedPassage,
};
