//! Persisted relevance matches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One persisted (article, research question) match. Unique per pair; after
/// creation only `user_sentiment`, `viewed`, and `bookmarked` mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleMatch {
    pub article_id: String,
    pub question_id: Uuid,
    /// In [0,1]; assigned once, never re-scored.
    pub relevance_score: f64,
    pub matched_keywords: Vec<String>,
    pub matched_topics: Vec<String>,
    pub matched_authors: Vec<String>,
    pub reasoning: Option<String>,
    pub user_sentiment: Option<String>,
    pub viewed: bool,
    pub bookmarked: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn find(&self, article_id: &str, question_id: Uuid)
        -> anyhow::Result<Option<ArticleMatch>>;

    /// Insert a match; a duplicate (article, question) pair is a silent no-op
    /// so re-runs cannot create a second row.
    async fn insert(&self, article_match: &ArticleMatch) -> anyhow::Result<()>;

    async fn list_for_question(&self, question_id: Uuid) -> anyhow::Result<Vec<ArticleMatch>>;

    /// The only post-creation mutations: user annotations.
    async fn set_sentiment(
        &self,
        article_id: &str,
        question_id: Uuid,
        sentiment: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn mark_viewed(&self, article_id: &str, question_id: Uuid) -> anyhow::Result<()>;

    async fn set_bookmarked(
        &self,
        article_id: &str,
        question_id: Uuid,
        bookmarked: bool,
    ) -> anyhow::Result<()>;
}
