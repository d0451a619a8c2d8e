use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{store::VectorStore, types::chunk::ChunkRecord},
    utils::{
        llm::GenerativeModel,
        retry::{retry_generative, RetryPolicy},
    },
};

use crate::prompt;

/// External capabilities the query stages call out to.
///
/// Splitting these behind a trait keeps the stage logic testable without a
/// populated store or a live model.
#[async_trait]
pub trait QueryServices: Send + Sync {
    /// Rewrites a vague query into one suited for retrieval.
    async fn rewrite_query(&self, query: &str) -> Result<String, AppError>;

    /// Returns up to `k` `(chunk, distance)` pairs ascending by distance.
    async fn search_chunks(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, AppError>;

    /// Produces the final answer from the query and rendered context.
    async fn synthesize_answer(&self, query: &str, context: &str) -> Result<String, AppError>;
}

/// Production services backed by the vector store and a generative model.
///
/// Generative calls run under the retry policy so transient quota
/// exhaustion backs off instead of failing the query.
pub struct DefaultQueryServices {
    store: Arc<VectorStore>,
    model: Arc<dyn GenerativeModel>,
    retry: RetryPolicy,
    domain: String,
}

impl DefaultQueryServices {
    pub fn new(
        store: Arc<VectorStore>,
        model: Arc<dyn GenerativeModel>,
        retry: RetryPolicy,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            store,
            model,
            retry,
            domain: domain.into(),
        }
    }
}

#[async_trait]
impl QueryServices for DefaultQueryServices {
    async fn rewrite_query(&self, query: &str) -> Result<String, AppError> {
        let prompt = prompt::rewrite_prompt(&self.domain, query);
        retry_generative(self.retry, || self.model.generate(&prompt)).await
    }

    async fn search_chunks(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, AppError> {
        self.store.search(query, k).await
    }

    async fn synthesize_answer(&self, query: &str, context: &str) -> Result<String, AppError> {
        let prompt = prompt::answer_prompt(&self.domain, query, context);
        retry_generative(self.retry, || self.model.generate(&prompt)).await
    }
}
