use common::{error::AppError, storage::types::chunk::ChunkRecord};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use super::{config::QueryConfig, services::QueryServices};

/// One retrieved chunk with its raw distance and derived similarity.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPassage {
    pub record: ChunkRecord,
    pub distance: f32,
    pub similarity: f32,
}

/// Mutable state threaded through the query stages.
pub struct QueryContext<'a> {
    pub config: &'a QueryConfig,
    pub services: &'a dyn QueryServices,
    pub request_id: Uuid,
    /// The query as the caller supplied it.
    pub query: String,
    /// The query retrieval and answering actually use; starts equal to
    /// `query` and is replaced when the rewrite stage runs.
    pub working_query: String,
    pub needs_reform: bool,
    pub passages: Vec<RetrievedPassage>,
    pub response: String,
}

impl<'a> QueryContext<'a> {
    pub fn new(config: &'a QueryConfig, services: &'a dyn QueryServices, query: &str) -> Self {
        let query = query.trim().to_string();
        Self {
            config,
            services,
            request_id: Uuid::new_v4(),
            working_query: query.clone(),
            query,
            needs_reform: false,
            passages: Vec::new(),
            response: String::new(),
        }
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            request_id = %self.request_id,
            query = %self.query,
            error = %err,
            "query pipeline aborted"
        );
        err
    }
}
