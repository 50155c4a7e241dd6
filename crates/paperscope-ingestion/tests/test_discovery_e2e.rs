//! End-to-end discovery pipeline tests with mock sources, a scripted oracle,
//! and in-memory repositories. No network, no database.

use std::sync::Arc;

use async_trait::async_trait;

use paperscope_common::{DiscoveryConfig, PaperscopeError, ResearchQuestion};
use paperscope_graph::{CitationGraphStore, MemoryGraphRepository};
use paperscope_ingestion::models::BibliographicRecord;
use paperscope_ingestion::pipeline::DiscoveryPipeline;
use paperscope_ingestion::sources::{SourceAdapter, SourceRegistry};
use paperscope_ingestion::MemoryQuestionRepository;
use paperscope_llm::{LlmError, LlmOracle};
use paperscope_matcher::{MatchStore, MemoryMatchStore, RelevanceMatcher};

// ── Test doubles ──────────────────────────────────────────────────────────────

struct StaticSource {
    name: &'static str,
    records: Vec<BibliographicRecord>,
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn discover(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> anyhow::Result<Vec<BibliographicRecord>> {
        Ok(self.records.clone())
    }
}

struct FailingSource {
    name: &'static str,
}

#[async_trait]
impl SourceAdapter for FailingSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn discover(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> anyhow::Result<Vec<BibliographicRecord>> {
        anyhow::bail!("upstream returned HTTP 503")
    }
}

/// Scores by content: anything mentioning "transformer" is relevant.
struct KeywordOracle;

#[async_trait]
impl LlmOracle for KeywordOracle {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.to_lowercase().contains("transformer") {
            Ok(r#"{"score": 0.9, "matched_keywords": ["transformer"], "reasoning": "on topic"}"#
                .to_string())
        } else {
            Ok(r#"{"score": 0.2, "matched_keywords": [], "reasoning": "off topic"}"#.to_string())
        }
    }

    fn model_id(&self) -> &str {
        "keyword-test"
    }
}

fn record(title: &str, source: &str, doi: Option<&str>) -> BibliographicRecord {
    let mut r = BibliographicRecord::new(title, source);
    r.doi = doi.map(String::from);
    r
}

struct Harness {
    pipeline: DiscoveryPipeline,
    questions: Arc<MemoryQuestionRepository>,
    matches: Arc<MemoryMatchStore>,
}

fn harness(registry: SourceRegistry, oracle: Arc<dyn LlmOracle>) -> Harness {
    let questions = Arc::new(MemoryQuestionRepository::new());
    let matches = Arc::new(MemoryMatchStore::new());
    let graph = CitationGraphStore::new(Arc::new(MemoryGraphRepository::new()));
    let matcher = RelevanceMatcher::new(oracle, matches.clone());
    let pipeline = DiscoveryPipeline::new(
        DiscoveryConfig::default(),
        registry,
        graph,
        matcher,
        questions.clone(),
    );
    Harness { pipeline, questions, matches }
}

/// The three-source scenario: 2 records, a failing source, and 3 records,
/// with one DOI-duplicate pair across sources.
fn scenario_registry() -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(StaticSource {
        name: "arxiv",
        records: vec![
            record("Efficient Transformer Inference", "arxiv", Some("10.1/eff")),
            record("Graph Pooling Methods", "arxiv", None),
        ],
    }));
    registry.register(Arc::new(FailingSource { name: "crossref" }));
    registry.register(Arc::new(StaticSource {
        name: "semanticscholar",
        records: vec![
            // Duplicate of the arxiv record, discovered under the same DOI
            record("Efficient Transformer Inference", "semanticscholar", Some("10.1/EFF")),
            record("Sparse Transformer Training", "semanticscholar", Some("10.1/sparse")),
            record("Soil Microbiome Dynamics", "semanticscholar", Some("10.1/soil")),
        ],
    }));
    registry
}

fn scenario_question() -> ResearchQuestion {
    ResearchQuestion::new("transformer efficiency")
        .with_keywords(&["transformer"])
        .with_sources(&["*"])
        .with_min_relevance(0.5)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_scenario() {
    let mut h = harness(scenario_registry(), Arc::new(KeywordOracle));
    let question = scenario_question();
    let question_id = h.questions.seed(question);

    let result = h.pipeline.run_for_question(question_id, None).await.unwrap();

    assert!(result.success);
    assert_eq!(result.articles_found, 5);
    assert_eq!(result.articles_processed, 4);
    assert_eq!(result.sources_queried.len(), 3);

    // Exactly one error, naming the failed source.
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("crossref"), "got {:?}", result.errors);

    // The two healthy sources still contributed.
    assert_eq!(result.per_source["arxiv"].records_found, 2);
    assert_eq!(result.per_source["semanticscholar"].records_found, 3);
    assert_eq!(result.per_source["crossref"].errors, 1);

    // Matches persisted only for records the oracle scored >= 0.5:
    // the merged transformer paper and the sparse-training paper.
    assert_eq!(result.articles_matched, 2);
    let matches = h.matches.list_for_question(question_id).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert!(matches.iter().all(|m| m.relevance_score >= 0.5));

    // The graph holds the four unique articles.
    assert_eq!(h.pipeline.graph().article_count(), 4);
    assert!(h.pipeline.graph().article("doi:10.1/eff").is_some());
}

#[tokio::test]
async fn test_partial_failure_isolation() {
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(StaticSource {
        name: "alpha",
        records: vec![record("Transformer Circuits", "alpha", Some("10.2/a"))],
    }));
    registry.register(Arc::new(FailingSource { name: "beta" }));
    registry.register(Arc::new(StaticSource {
        name: "gamma",
        records: vec![record("Transformer Scaling Laws", "gamma", Some("10.2/c"))],
    }));

    let mut h = harness(registry, Arc::new(KeywordOracle));
    let question_id = h.questions.seed(scenario_question());

    let result = h.pipeline.run_for_question(question_id, None).await.unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("beta"));
    assert_eq!(result.articles_found, 2);
    assert_eq!(result.articles_processed, 2);
    assert_eq!(result.articles_matched, 2);
}

#[tokio::test]
async fn test_rerun_creates_no_second_match_and_preserves_sentiment() {
    let mut h = harness(scenario_registry(), Arc::new(KeywordOracle));
    let question_id = h.questions.seed(scenario_question());

    let first = h.pipeline.run_for_question(question_id, None).await.unwrap();
    assert_eq!(first.articles_matched, 2);

    h.matches
        .set_sentiment("doi:10.1/eff", question_id, Some("promising"))
        .await
        .unwrap();

    // Second run over an unchanged article set.
    let second = h.pipeline.run_for_question(question_id, None).await.unwrap();
    assert_eq!(second.articles_matched, 0);

    let matches = h.matches.list_for_question(question_id).await.unwrap();
    assert_eq!(matches.len(), 2);
    let eff = matches.iter().find(|m| m.article_id == "doi:10.1/eff").unwrap();
    assert_eq!(eff.user_sentiment.as_deref(), Some("promising"));
}

#[tokio::test]
async fn test_unknown_question_is_a_configuration_error() {
    let mut h = harness(scenario_registry(), Arc::new(KeywordOracle));
    let missing = uuid::Uuid::new_v4();
    let err = h.pipeline.run_for_question(missing, None).await.unwrap_err();
    assert!(matches!(err, PaperscopeError::QuestionNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_batch_continues_past_missing_question() {
    let mut h = harness(scenario_registry(), Arc::new(KeywordOracle));
    let good = h.questions.seed(scenario_question());
    let missing = uuid::Uuid::new_v4();

    let batch = h.pipeline.run_batch(&[missing, good]).await;

    assert_eq!(batch.total_questions, 2);
    assert_eq!(batch.questions_succeeded, 1);
    assert_eq!(batch.questions_failed, 1);
    assert_eq!(batch.articles_matched, 2);
    assert_eq!(batch.results.len(), 1);
}

#[tokio::test]
async fn test_explicit_source_selection_with_unknown_name() {
    let mut h = harness(scenario_registry(), Arc::new(KeywordOracle));
    let question = scenario_question().with_sources(&["arxiv", "scopus"]);
    let question_id = h.questions.seed(question);

    let result = h.pipeline.run_for_question(question_id, None).await.unwrap();

    // Unknown "scopus" dropped without an error entry; arxiv queried alone.
    assert_eq!(result.sources_queried, vec!["arxiv"]);
    assert!(result.errors.is_empty());
    assert_eq!(result.articles_found, 2);
}

#[tokio::test]
async fn test_max_articles_caps_processing() {
    let mut h = harness(scenario_registry(), Arc::new(KeywordOracle));
    let question_id = h.questions.seed(scenario_question());

    let result = h.pipeline.run_for_question(question_id, Some(2)).await.unwrap();
    assert_eq!(result.articles_found, 5);
    assert_eq!(result.articles_processed, 2);
}

#[tokio::test]
async fn test_run_audit_record_is_written() {
    let mut h = harness(scenario_registry(), Arc::new(KeywordOracle));
    let question_id = h.questions.seed(scenario_question());
    h.pipeline.run_for_question(question_id, None).await.unwrap();

    let runs = h.questions.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].question_id, question_id);
    assert_eq!(runs[0].articles_found, 5);
    assert!(runs[0].success);
}
