//! Graph persistence trait.
//!
//! The store drives one of these to sync the in-memory graph with the
//! relational store. Row resolution and conflict handling are the
//! implementation's concern; the store only sees typed outcomes.

use async_trait::async_trait;

use crate::model::{CanonicalArticle, CitationData};

/// One citation row: edge endpoints by canonical id plus the payload.
#[derive(Debug, Clone)]
pub struct StoredCitation {
    pub citing_id: String,
    pub cited_id: String,
    pub data: CitationData,
}

/// What happened to one article row during a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleSaveOutcome {
    Inserted,
    Updated,
    /// Insert raced a concurrent writer and the one-shot retry-as-update
    /// also failed; this node's save was skipped.
    SkippedConflict,
}

#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// One row per article.
    async fn load_articles(&self) -> anyhow::Result<Vec<CanonicalArticle>>;

    /// One row per citation edge.
    async fn load_citations(&self) -> anyhow::Result<Vec<StoredCitation>>;

    /// Upsert one article. Implementations resolve any existing row by doi,
    /// then arxiv_id, then title equality, and must merge with
    /// `COALESCE(new, old)` semantics so a partial write never erases
    /// previously known data.
    async fn upsert_article(&self, article: &CanonicalArticle)
        -> anyhow::Result<ArticleSaveOutcome>;

    /// Upsert one citation edge, merging the payload on conflict.
    async fn upsert_citation(
        &self,
        citing_id: &str,
        cited_id: &str,
        data: &CitationData,
    ) -> anyhow::Result<()>;
}
