mod config;
mod context;
pub mod services;
mod stages;
mod state;

pub use config::QueryConfig;
pub use context::RetrievedPassage;

use std::{sync::Arc, time::Instant};

use common::error::AppError;
use serde::Serialize;
use tracing::info;

use self::{
    context::QueryContext,
    services::QueryServices,
    stages::{analyze, reform, respond, retrieve},
    state::ready,
};

/// Everything produced while answering one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// The query as the caller supplied it.
    pub query: String,
    /// The query retrieval actually ran with, after any rewrite.
    pub working_query: String,
    pub needs_reform: bool,
    pub context_count: usize,
    pub response: String,
    /// Retrieved passages ascending by distance.
    pub context: Vec<RetrievedPassage>,
}

/// Answers questions against the vector store by driving each query through
/// analysis, optional rewriting, retrieval and synthesis in strict order.
pub struct QueryPipeline {
    config: QueryConfig,
    services: Arc<dyn QueryServices>,
}

impl QueryPipeline {
    pub fn new(services: Arc<dyn QueryServices>, config: QueryConfig) -> Self {
        Self { config, services }
    }

    #[tracing::instrument(skip_all)]
    pub async fn answer(&self, query: &str) -> Result<QueryOutcome, AppError> {
        let mut ctx = QueryContext::new(&self.config, self.services.as_ref(), query);
        let started = Instant::now();

        let machine = ready();
        let machine = analyze(machine, &mut ctx).map_err(|err| ctx.abort(err))?;
        let machine = reform(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;
        let machine = retrieve(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;
        let _machine = respond(machine, &mut ctx).await.map_err(|err| ctx.abort(err))?;

        info!(
            request_id = %ctx.request_id,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            passages = ctx.passages.len(),
            "query answered"
        );

        Ok(QueryOutcome {
            query: ctx.query,
            working_query: ctx.working_query,
            needs_reform: ctx.needs_reform,
            context_count: ctx.passages.len(),
            response: ctx.response,
            context: ctx.passages,
        })
    }
}

#[cfg(test)]
mod tests;
