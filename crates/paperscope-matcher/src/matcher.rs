//! The relevance matcher: prompt construction, scoring, and match
//! persistence with first-score-wins semantics.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use paperscope_common::ResearchQuestion;
use paperscope_graph::CanonicalArticle;
use paperscope_llm::LlmOracle;

use crate::score::parse_score_response;
use crate::store::{ArticleMatch, MatchStore};

/// The scoring result for one (article, question) pair.
#[derive(Debug, Clone)]
pub struct RelevanceScore {
    pub score: f64,
    pub matched_keywords: Vec<String>,
    pub matched_topics: Vec<String>,
    pub matched_authors: Vec<String>,
    pub reasoning: String,
}

/// What `evaluate` did for one pair.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// A match already exists; it was not re-scored.
    AlreadyMatched,
    /// Scored at or above the question's threshold and persisted.
    Matched(ArticleMatch),
    /// Scored below the threshold; nothing persisted.
    BelowThreshold(f64),
}

pub struct RelevanceMatcher {
    oracle: Arc<dyn LlmOracle>,
    store: Arc<dyn MatchStore>,
}

impl RelevanceMatcher {
    pub fn new(oracle: Arc<dyn LlmOracle>, store: Arc<dyn MatchStore>) -> Self {
        Self { oracle, store }
    }

    pub fn store(&self) -> Arc<dyn MatchStore> {
        Arc::clone(&self.store)
    }

    /// Score one article against one question via the oracle. An unparsable
    /// response downgrades to a zero score rather than an error; only the
    /// oracle call itself can fail.
    #[instrument(skip(self, article, question), fields(article_id = %article.id, question = %question.name))]
    pub async fn score_article(
        &self,
        article: &CanonicalArticle,
        question: &ResearchQuestion,
    ) -> anyhow::Result<RelevanceScore> {
        let prompt = build_prompt(article, question);
        let response = self.oracle.generate(&prompt).await?;

        let parsed = match parse_score_response(&response) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Unparsable score response; downgrading to 0.0");
                return Ok(RelevanceScore {
                    score: 0.0,
                    matched_keywords: Vec::new(),
                    matched_topics: Vec::new(),
                    matched_authors: Vec::new(),
                    reasoning: "parse failure".to_string(),
                });
            }
        };

        Ok(RelevanceScore {
            score: parsed.score,
            matched_keywords: parsed.matched_keywords,
            matched_topics: matched_topics(article, question),
            matched_authors: matched_authors(article, question),
            reasoning: parsed.reasoning,
        })
    }

    /// Evaluate one pair end to end: skip if a match already exists (first
    /// score wins), otherwise score and persist when the score clears the
    /// question's threshold. The threshold is inclusive.
    pub async fn evaluate(
        &self,
        article: &CanonicalArticle,
        question: &ResearchQuestion,
    ) -> anyhow::Result<MatchOutcome> {
        if self.store.find(&article.id, question.id).await?.is_some() {
            debug!(article_id = %article.id, "Match exists; not re-scoring");
            return Ok(MatchOutcome::AlreadyMatched);
        }

        let scored = self.score_article(article, question).await?;
        if scored.score < question.min_relevance_score {
            return Ok(MatchOutcome::BelowThreshold(scored.score));
        }

        let article_match = ArticleMatch {
            article_id: article.id.clone(),
            question_id: question.id,
            relevance_score: scored.score,
            matched_keywords: scored.matched_keywords,
            matched_topics: scored.matched_topics,
            matched_authors: scored.matched_authors,
            reasoning: if scored.reasoning.is_empty() { None } else { Some(scored.reasoning) },
            user_sentiment: None,
            viewed: false,
            bookmarked: false,
            created_at: Utc::now(),
        };
        self.store.insert(&article_match).await?;
        Ok(MatchOutcome::Matched(article_match))
    }
}

/// One prompt per pair: article metadata against the question's interests,
/// with an explicit JSON-only instruction.
fn build_prompt(article: &CanonicalArticle, question: &ResearchQuestion) -> String {
    let abstract_text = article.abstract_text.as_deref().unwrap_or("(no abstract available)");
    format!(
        "You are assessing whether a newly discovered article is relevant to a \
         standing research question.\n\n\
         Article:\n\
         Title: {title}\n\
         Authors: {authors}\n\
         Abstract: {abstract_text}\n\n\
         Research question: {name}\n\
         Keywords: {keywords}\n\
         Topics: {topics}\n\
         Preferred authors: {pref_authors}\n\n\
         Respond with JSON only, no prose and no code fences:\n\
         {{\"score\": <0.0-1.0>, \"matched_keywords\": [..], \"reasoning\": \"..\"}}",
        title = article.title,
        authors = article.authors.join(", "),
        abstract_text = abstract_text,
        name = question.name,
        keywords = question.keywords.join(", "),
        topics = question.topics.join(", "),
        pref_authors = question.authors.join(", "),
    )
}

fn matched_topics(article: &CanonicalArticle, question: &ResearchQuestion) -> Vec<String> {
    let haystack = format!(
        "{} {}",
        article.title,
        article.abstract_text.as_deref().unwrap_or("")
    )
    .to_lowercase();
    question
        .topics
        .iter()
        .filter(|t| haystack.contains(&t.to_lowercase()))
        .cloned()
        .collect()
}

fn matched_authors(article: &CanonicalArticle, question: &ResearchQuestion) -> Vec<String> {
    question
        .authors
        .iter()
        .filter(|wanted| {
            let wanted = wanted.to_lowercase();
            article
                .authors
                .iter()
                .any(|a| a.to_lowercase().contains(&wanted))
        })
        .cloned()
        .collect()
}
