use common::error::AppError;
use state_machines::core::GuardError;
use tracing::{debug, info, instrument, warn};

use crate::scoring::similarity_from_distance;

use super::{
    context::{QueryContext, RetrievedPassage},
    state::{Analyzed, QueryMachine, Ready, Reformed, Responded, Retrieved},
};

#[instrument(level = "trace", skip_all)]
pub fn analyze(
    machine: QueryMachine<(), Ready>,
    ctx: &mut QueryContext<'_>,
) -> Result<QueryMachine<(), Analyzed>, AppError> {
    ctx.needs_reform = needs_reform(&ctx.query, ctx.config.min_query_chars);

    debug!(
        request_id = %ctx.request_id,
        needs_reform = ctx.needs_reform,
        "query analyzed"
    );

    machine
        .analyze()
        .map_err(|(_, guard)| map_guard_error("analyze", &guard))
}

#[instrument(level = "trace", skip_all)]
pub async fn reform(
    machine: QueryMachine<(), Analyzed>,
    ctx: &mut QueryContext<'_>,
) -> Result<QueryMachine<(), Reformed>, AppError> {
    if !ctx.needs_reform {
        return machine
            .skip_reform()
            .map_err(|(_, guard)| map_guard_error("skip_reform", &guard));
    }

    let rewritten = ctx.services.rewrite_query(&ctx.query).await?;
    let rewritten = rewritten.trim();
    if rewritten.is_empty() {
        warn!(
            request_id = %ctx.request_id,
            "query rewrite came back empty; keeping the original query"
        );
    } else {
        info!(
            request_id = %ctx.request_id,
            rewritten,
            "query rewritten for retrieval"
        );
        ctx.working_query = rewritten.to_string();
    }

    machine
        .reform()
        .map_err(|(_, guard)| map_guard_error("reform", &guard))
}

#[instrument(level = "trace", skip_all)]
pub async fn retrieve(
    machine: QueryMachine<(), Reformed>,
    ctx: &mut QueryContext<'_>,
) -> Result<QueryMachine<(), Retrieved>, AppError> {
    let hits = ctx
        .services
        .search_chunks(&ctx.working_query, ctx.config.top_k)
        .await?;

    ctx.passages = hits
        .into_iter()
        .map(|(record, distance)| RetrievedPassage {
            similarity: similarity_from_distance(distance),
            record,
            distance,
        })
        .collect();

    info!(
        request_id = %ctx.request_id,
        passages = ctx.passages.len(),
        "context retrieved"
    );

    machine
        .retrieve()
        .map_err(|(_, guard)| map_guard_error("retrieve", &guard))
}

#[instrument(level = "trace", skip_all)]
pub async fn respond(
    machine: QueryMachine<(), Retrieved>,
    ctx: &mut QueryContext<'_>,
) -> Result<QueryMachine<(), Responded>, AppError> {
    if ctx.passages.is_empty() {
        warn!(
            request_id = %ctx.request_id,
            "no context retrieved; the model must answer from an empty context block"
        );
    }
    let context = crate::prompt::render_context(&ctx.passages);
    ctx.response = ctx
        .services
        .synthesize_answer(&ctx.working_query, &context)
        .await?;

    machine
        .respond()
        .map_err(|(_, guard)| map_guard_error("respond", &guard))
}

/// A query is rewritten when it is too short to carry intent or is a single
/// bare token.
pub fn needs_reform(query: &str, min_query_chars: usize) -> bool {
    query.chars().count() < min_query_chars || !query.contains(char::is_whitespace)
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::Internal(format!(
        "invalid query pipeline transition during {event}: {guard:?}"
    ))
}
