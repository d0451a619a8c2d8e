use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{store::VectorStore, types::chunk::ChunkRecord},
    utils::{embedding::EmbeddingProvider, llm::GenerativeModel, retry::RetryPolicy},
};

use super::{
    services::{DefaultQueryServices, QueryServices},
    QueryConfig, QueryPipeline,
};

fn chunk(id: usize, content: &str) -> ChunkRecord {
    ChunkRecord {
        chunk_id: format!("loans_chunk_{id}"),
        original_file: "loans.jsonl".into(),
        content: content.into(),
        ..ChunkRecord::default()
    }
}

/// Records every service call so tests can assert on stage ordering.
struct MockServices {
    calls: Mutex<Vec<String>>,
    contexts: Mutex<Vec<String>>,
    rewrite_result: String,
    hits: Vec<(ChunkRecord, f32)>,
}

impl MockServices {
    fn new(rewrite_result: &str, hits: Vec<(ChunkRecord, f32)>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
            rewrite_result: rewrite_result.to_string(),
            hits,
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueryServices for MockServices {
    async fn rewrite_query(&self, query: &str) -> Result<String, AppError> {
        self.record(format!("rewrite:{query}"));
        Ok(self.rewrite_result.clone())
    }

    async fn search_chunks(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, AppError> {
        self.record(format!("search:{query}"));
        Ok(self.hits.iter().take(k).cloned().collect())
    }

    async fn synthesize_answer(&self, query: &str, context: &str) -> Result<String, AppError> {
        self.record(format!("answer:{query}"));
        self.contexts.lock().unwrap().push(context.to_string());
        Ok("synthesized answer".to_string())
    }
}

#[tokio::test]
async fn vague_queries_are_rewritten_before_retrieval() {
    let services = Arc::new(MockServices::new(
        "what are the gold loan interest rates",
        vec![(chunk(0, "Gold loans are secured by pledged ornaments."), 0.3)],
    ));
    let pipeline = QueryPipeline::new(services.clone(), QueryConfig::default());

    let outcome = pipeline.answer("gold").await.unwrap();

    assert!(outcome.needs_reform);
    assert_eq!(outcome.query, "gold");
    assert_eq!(outcome.working_query, "what are the gold loan interest rates");
    assert_eq!(outcome.response, "synthesized answer");
    assert_eq!(
        services.calls(),
        vec![
            "rewrite:gold".to_string(),
            "search:what are the gold loan interest rates".to_string(),
            "answer:what are the gold loan interest rates".to_string(),
        ]
    );
}

#[tokio::test]
async fn well_formed_queries_skip_the_rewrite() {
    let services = Arc::new(MockServices::new(
        "unused",
        vec![(chunk(0, "Home loan rates start at 8.35 percent."), 0.2)],
    ));
    let pipeline = QueryPipeline::new(services.clone(), QueryConfig::default());

    let outcome = pipeline
        .answer("what is the home loan rate")
        .await
        .unwrap();

    assert!(!outcome.needs_reform);
    assert_eq!(outcome.working_query, outcome.query);
    assert!(services.calls().iter().all(|call| !call.starts_with("rewrite:")));
}

#[tokio::test]
async fn empty_rewrite_falls_back_to_the_original_query() {
    let services = Arc::new(MockServices::new(
        "   ",
        vec![(chunk(0, "EMI stands for equated monthly instalment."), 0.4)],
    ));
    let pipeline = QueryPipeline::new(services.clone(), QueryConfig::default());

    let outcome = pipeline.answer("emi").await.unwrap();

    assert!(outcome.needs_reform);
    assert_eq!(outcome.working_query, "emi");
    assert!(services
        .calls()
        .contains(&"search:emi".to_string()));
}

#[tokio::test]
async fn empty_retrieval_still_synthesizes_from_an_empty_context() {
    let services = Arc::new(MockServices::new("unused", Vec::new()));
    let pipeline = QueryPipeline::new(services.clone(), QueryConfig::default());

    let outcome = pipeline
        .answer("what is the processing fee waiver")
        .await
        .unwrap();

    assert_eq!(outcome.response, "synthesized answer");
    assert!(outcome.context.is_empty());
    assert_eq!(outcome.context_count, 0);
    // the model is still consulted, with nothing in the context block
    assert!(services
        .calls()
        .contains(&"answer:what is the processing fee waiver".to_string()));
    assert_eq!(services.contexts(), vec![String::new()]);
}

#[tokio::test]
async fn passages_carry_similarity_consistent_with_distance() {
    let services = Arc::new(MockServices::new(
        "unused",
        vec![
            (chunk(0, "Closest passage."), 0.1),
            (chunk(1, "Further passage."), 0.9),
        ],
    ));
    let pipeline = QueryPipeline::new(services, QueryConfig::default());

    let outcome = pipeline.answer("tell me about loans").await.unwrap();

    assert_eq!(outcome.context.len(), 2);
    let first = &outcome.context[0];
    let second = &outcome.context[1];
    assert!(first.distance < second.distance);
    assert!(first.similarity > second.similarity);
}

#[tokio::test]
async fn blank_queries_go_through_the_reform_path() {
    let services = Arc::new(MockServices::new(
        "which loan products are offered",
        vec![(chunk(0, "Loan products include home, gold and education loans."), 0.5)],
    ));
    let pipeline = QueryPipeline::new(services.clone(), QueryConfig::default());

    let outcome = pipeline.answer("   ").await.unwrap();

    assert!(outcome.needs_reform);
    assert_eq!(outcome.query, "");
    assert_eq!(outcome.working_query, "which loan products are offered");
    assert_eq!(
        services.calls().first(),
        Some(&"rewrite:".to_string())
    );
}

/// Fails with quota exhaustion a fixed number of times, then answers.
struct FlakyModel {
    attempts: AtomicUsize,
    failures: usize,
}

#[async_trait]
impl GenerativeModel for FlakyModel {
    async fn generate(&self, _prompt: &str) -> Result<String, AppError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            Err(AppError::QuotaExhausted("429 Too Many Requests".into()))
        } else {
            Ok("grounded answer".to_string())
        }
    }
}

#[tokio::test]
async fn quota_exhaustion_during_synthesis_is_retried() {
    let provider = Arc::new(EmbeddingProvider::new_hashed(32));
    let mut store = VectorStore::new(provider);
    store
        .add_chunks(vec![
            chunk(0, "Home loan interest rates start at 8.35 percent."),
            chunk(1, "Education loans cover tuition and hostel fees."),
        ])
        .await
        .unwrap();

    let model = Arc::new(FlakyModel {
        attempts: AtomicUsize::new(0),
        failures: 2,
    });
    let retry = RetryPolicy {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    let services = Arc::new(DefaultQueryServices::new(
        Arc::new(store),
        model.clone(),
        retry,
        "retail loan products",
    ));
    let pipeline = QueryPipeline::new(services, QueryConfig::default());

    let outcome = pipeline
        .answer("what is the home loan rate")
        .await
        .unwrap();

    assert_eq!(outcome.response, "grounded answer");
    assert_eq!(model.attempts.load(Ordering::SeqCst), 3);
    assert!(!outcome.context.is_empty());
}

#[tokio::test]
async fn exhausted_retries_surface_the_quota_error() {
    let provider = Arc::new(EmbeddingProvider::new_hashed(32));
    let mut store = VectorStore::new(provider);
    store
        .add_chunks(vec![chunk(0, "Gold loan margin is 25 percent.")])
        .await
        .unwrap();

    let model = Arc::new(FlakyModel {
        attempts: AtomicUsize::new(0),
        failures: usize::MAX,
    });
    let retry = RetryPolicy {
        max_retries: 1,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    let services = Arc::new(DefaultQueryServices::new(
        Arc::new(store),
        model,
        retry,
        "retail loan products",
    ));
    let pipeline = QueryPipeline::new(services, QueryConfig::default());

    let err = pipeline
        .answer("what is the gold loan margin")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::QuotaExhausted(_)));
}
