//! End-to-end discovery orchestration.
//!
//! For one research question:
//!   1. Resolve `selected_sources` against the registry (`"*"` expands,
//!      unknown names are dropped with a log entry)
//!   2. Query every resolved source concurrently; each branch is
//!      failure-isolated — an error becomes an error-list entry and an empty
//!      result, never a cancelled run
//!   3. Flatten and deduplicate the raw records
//!   4. Per unique record: identity resolution + citation graph upsert +
//!      relevance matching
//!   5. Save the graph, persist qualifying matches, record run statistics
//!
//! A run always returns a structured result with a `success` flag and an
//! `errors` list; only configuration-class problems (unknown question id,
//! dead database) are raised to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use paperscope_common::{
    resolve_identity, DiscoveryConfig, PaperscopeError, ResearchQuestion, Result,
};
use paperscope_graph::CitationGraphStore;
use paperscope_matcher::{MatchOutcome, RelevanceMatcher};

use crate::dedup::deduplicate;
use crate::models::BibliographicRecord;
use crate::repository::{DiscoveryRunRecord, QuestionRepository};
use crate::sources::SourceRegistry;

/// Per-source counters for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStats {
    pub records_found: usize,
    pub errors: usize,
}

/// Structured result of one discovery run.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryRunResult {
    pub question_id: Uuid,
    pub success: bool,
    pub articles_found: usize,
    pub articles_processed: usize,
    pub articles_matched: usize,
    pub sources_queried: Vec<String>,
    pub per_source: HashMap<String, SourceStats>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Aggregate of a batch run across many questions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryBatchResult {
    pub total_questions: usize,
    pub questions_succeeded: usize,
    pub questions_failed: usize,
    pub articles_found: usize,
    pub articles_processed: usize,
    pub articles_matched: usize,
    pub results: Vec<DiscoveryRunResult>,
}

pub struct DiscoveryPipeline {
    config: DiscoveryConfig,
    registry: SourceRegistry,
    graph: CitationGraphStore,
    matcher: RelevanceMatcher,
    questions: Arc<dyn QuestionRepository>,
}

impl DiscoveryPipeline {
    pub fn new(
        config: DiscoveryConfig,
        registry: SourceRegistry,
        graph: CitationGraphStore,
        matcher: RelevanceMatcher,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self { config, registry, graph, matcher, questions }
    }

    pub fn graph(&self) -> &CitationGraphStore {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut CitationGraphStore {
        &mut self.graph
    }

    /// Run discovery for a stored question. An unknown question id is a
    /// configuration error and is raised; everything else is absorbed into
    /// the returned result.
    pub async fn run_for_question(
        &mut self,
        question_id: Uuid,
        max_articles: Option<usize>,
    ) -> Result<DiscoveryRunResult> {
        let question = self
            .questions
            .get_question(question_id)
            .await
            .map_err(PaperscopeError::Other)?
            .ok_or(PaperscopeError::QuestionNotFound(question_id))?;
        Ok(self.run_discovery(&question, max_articles).await)
    }

    /// Run the pipeline across many questions, aggregating totals and
    /// continuing past any single question's failure.
    pub async fn run_batch(&mut self, question_ids: &[Uuid]) -> DiscoveryBatchResult {
        let mut batch = DiscoveryBatchResult {
            total_questions: question_ids.len(),
            ..Default::default()
        };

        // Sequential on purpose: the graph store is single-writer.
        for &question_id in question_ids {
            match self.run_for_question(question_id, None).await {
                Ok(result) => {
                    if result.success {
                        batch.questions_succeeded += 1;
                    } else {
                        batch.questions_failed += 1;
                    }
                    batch.articles_found += result.articles_found;
                    batch.articles_processed += result.articles_processed;
                    batch.articles_matched += result.articles_matched;
                    batch.results.push(result);
                }
                Err(e) => {
                    warn!(question_id = %question_id, error = %e, "Question failed; batch continues");
                    batch.questions_failed += 1;
                }
            }
        }

        info!(
            total = batch.total_questions,
            succeeded = batch.questions_succeeded,
            failed = batch.questions_failed,
            matched = batch.articles_matched,
            "Discovery batch complete"
        );
        batch
    }

    /// One discovery run for one question. Never errors: partial failures
    /// land in the result's `errors` list.
    #[instrument(skip(self, question), fields(question = %question.name))]
    pub async fn run_discovery(
        &mut self,
        question: &ResearchQuestion,
        max_articles: Option<usize>,
    ) -> DiscoveryRunResult {
        let t0 = std::time::Instant::now();

        let adapters = self.registry.resolve(&question.selected_sources);
        let sources_queried: Vec<String> =
            adapters.iter().map(|a| a.name().to_string()).collect();

        let mut result = DiscoveryRunResult {
            question_id: question.id,
            success: true,
            articles_found: 0,
            articles_processed: 0,
            articles_matched: 0,
            sources_queried: sources_queried.clone(),
            per_source: sources_queried
                .iter()
                .map(|name| (name.clone(), SourceStats::default()))
                .collect(),
            errors: Vec::new(),
            duration_ms: 0,
        };

        if adapters.is_empty() {
            warn!("No sources resolved for question; nothing to do");
        }

        let query = build_query(question);
        info!(query = %query, n_sources = adapters.len(), "Starting discovery run");

        // ── Fan out: one failure-isolated branch per source ──────────────────
        let max_results = self.config.max_results_per_source as usize;
        let branches = adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            let query = query.clone();
            async move {
                let name = adapter.name().to_string();
                let outcome = adapter.discover(&query, max_results).await;
                (name, outcome)
            }
        });

        let mut all_records: Vec<BibliographicRecord> = Vec::new();
        for (name, outcome) in future::join_all(branches).await {
            let stats = result.per_source.entry(name.clone()).or_default();
            match outcome {
                Ok(records) => {
                    info!(source = %name, n = records.len(), "Records retrieved");
                    stats.records_found = records.len();
                    all_records.extend(records);
                }
                Err(e) => {
                    let msg = format!("source {name}: {e}");
                    warn!("{}", &msg);
                    stats.errors += 1;
                    result.errors.push(msg);
                }
            }
        }
        result.articles_found = all_records.len();

        // ── Deduplicate ──────────────────────────────────────────────────────
        let mut unique = deduplicate(all_records);
        if let Some(cap) = max_articles {
            unique.truncate(cap);
        }

        // ── Identity resolution + graph upsert + relevance matching ──────────
        self.graph.set_batch_mode(true);
        for record in &unique {
            let article_id = resolve_identity(&record.identity_signals());
            self.graph
                .add_article(&article_id, record.to_article_metadata(), None, None, None)
                .await;
            result.articles_processed += 1;

            let article = match self.graph.article(&article_id) {
                Some(a) => a.clone(),
                None => continue,
            };
            match self.matcher.evaluate(&article, question).await {
                Ok(MatchOutcome::Matched(m)) => {
                    info!(article_id = %article_id, score = m.relevance_score, "Article matched");
                    result.articles_matched += 1;
                }
                Ok(MatchOutcome::AlreadyMatched) | Ok(MatchOutcome::BelowThreshold(_)) => {}
                Err(e) => {
                    let msg = format!("scoring {article_id}: {e}");
                    warn!("{}", &msg);
                    result.errors.push(msg);
                }
            }
        }
        self.graph.set_batch_mode(false);

        if let Err(e) = self.graph.save().await {
            let msg = format!("graph save: {e}");
            warn!("{}", &msg);
            result.errors.push(msg);
            result.success = false;
        }

        result.duration_ms = t0.elapsed().as_millis() as u64;
        self.record_run(question, &result).await;

        info!(
            articles_found = result.articles_found,
            articles_processed = result.articles_processed,
            articles_matched = result.articles_matched,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Discovery run complete"
        );
        result
    }

    async fn record_run(&self, question: &ResearchQuestion, result: &DiscoveryRunResult) {
        let record = DiscoveryRunRecord {
            id: Uuid::new_v4(),
            question_id: question.id,
            success: result.success,
            articles_found: result.articles_found as i64,
            articles_processed: result.articles_processed as i64,
            articles_matched: result.articles_matched as i64,
            sources_queried: result.sources_queried.clone(),
            errors: result.errors.clone(),
            duration_ms: result.duration_ms as i64,
            finished_at: chrono::Utc::now(),
        };
        if let Err(e) = self.questions.record_run(&record).await {
            warn!(error = %e, "Run audit record could not be written");
        }
    }
}

/// Build the source query from a question: keywords first, topics as a
/// fallback, the question name as a last resort.
fn build_query(question: &ResearchQuestion) -> String {
    if !question.keywords.is_empty() {
        return question.keywords.join(" ");
    }
    if !question.topics.is_empty() {
        return question.topics.join(" ");
    }
    question.name.clone()
}
