//! In-memory `GraphRepository` for tests and ephemeral runs.
//!
//! Mirrors the relational implementation's semantics: rows are resolved by
//! doi, then arxiv_id, then title; updates keep existing values where the
//! incoming ones are absent. A write counter backs the no-writes-when-clean
//! property tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::model::{CanonicalArticle, CitationData};
use crate::repository::{ArticleSaveOutcome, GraphRepository, StoredCitation};

#[derive(Default)]
pub struct MemoryGraphRepository {
    articles: Mutex<Vec<CanonicalArticle>>,
    citations: Mutex<HashMap<(String, String), CitationData>>,
    writes: AtomicUsize,
}

impl MemoryGraphRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total upsert calls that reached this repository.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn article_rows(&self) -> Vec<CanonicalArticle> {
        self.articles.lock().unwrap().clone()
    }

    /// Test hook: plant a citation row without endpoint checks.
    pub fn insert_raw_citation(&self, citing: &str, cited: &str, data: CitationData) {
        self.citations
            .lock()
            .unwrap()
            .insert((citing.to_string(), cited.to_string()), data);
    }

    fn resolve_index(
        rows: &[CanonicalArticle],
        article: &CanonicalArticle,
    ) -> Option<usize> {
        if let Some(doi) = &article.doi {
            if let Some(i) = rows.iter().position(|r| r.doi.as_ref() == Some(doi)) {
                return Some(i);
            }
        }
        if let Some(arxiv) = &article.arxiv_id {
            if let Some(i) = rows.iter().position(|r| r.arxiv_id.as_ref() == Some(arxiv)) {
                return Some(i);
            }
        }
        rows.iter().position(|r| r.title == article.title)
    }
}

fn coalesce(existing: &mut Option<String>, incoming: &Option<String>) {
    if incoming.is_some() {
        *existing = incoming.clone();
    }
}

#[async_trait]
impl GraphRepository for MemoryGraphRepository {
    async fn load_articles(&self) -> anyhow::Result<Vec<CanonicalArticle>> {
        Ok(self.articles.lock().unwrap().clone())
    }

    async fn load_citations(&self) -> anyhow::Result<Vec<StoredCitation>> {
        Ok(self
            .citations
            .lock()
            .unwrap()
            .iter()
            .map(|((citing, cited), data)| StoredCitation {
                citing_id: citing.clone(),
                cited_id: cited.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn upsert_article(
        &self,
        article: &CanonicalArticle,
    ) -> anyhow::Result<ArticleSaveOutcome> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.articles.lock().unwrap();

        match Self::resolve_index(&rows, article) {
            Some(i) => {
                let row = &mut rows[i];
                // The canonical id always moves forward to the latest key.
                row.id = article.id.clone();
                if !article.title.is_empty() {
                    row.title = article.title.clone();
                }
                if !article.authors.is_empty() {
                    row.authors = article.authors.clone();
                }
                coalesce(&mut row.abstract_text, &article.abstract_text);
                coalesce(&mut row.doi, &article.doi);
                coalesce(&mut row.arxiv_id, &article.arxiv_id);
                coalesce(&mut row.venue, &article.venue);
                if article.publication_date.is_some() {
                    row.publication_date = article.publication_date;
                }
                coalesce(&mut row.url, &article.url);
                coalesce(&mut row.pdf_url, &article.pdf_url);
                if !article.keywords.is_empty() {
                    row.keywords = article.keywords.clone();
                }
                if article.analysis.is_some() {
                    row.analysis = article.analysis.clone();
                }
                coalesce(&mut row.analysis_model, &article.analysis_model);
                coalesce(&mut row.pdf_path, &article.pdf_path);
                coalesce(&mut row.markdown_path, &article.markdown_path);
                coalesce(&mut row.note_path, &article.note_path);
                row.last_updated = article.last_updated;
                Ok(ArticleSaveOutcome::Updated)
            }
            None => {
                rows.push(article.clone());
                Ok(ArticleSaveOutcome::Inserted)
            }
        }
    }

    async fn upsert_citation(
        &self,
        citing_id: &str,
        cited_id: &str,
        data: &CitationData,
    ) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut citations = self.citations.lock().unwrap();
        match citations.get_mut(&(citing_id.to_string(), cited_id.to_string())) {
            Some(existing) => {
                existing.merge(data);
            }
            None => {
                citations.insert((citing_id.to_string(), cited_id.to_string()), data.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArticleMetadata;

    fn article(id: &str, title: &str) -> CanonicalArticle {
        CanonicalArticle::new(
            id,
            ArticleMetadata { title: title.to_string(), ..Default::default() },
        )
    }

    #[tokio::test]
    async fn test_upsert_resolves_by_doi_before_title() {
        let repo = MemoryGraphRepository::new();

        let mut first = article("title:old-preprint-title", "Old preprint title");
        first.doi = Some("10.1/x".to_string());
        repo.upsert_article(&first).await.unwrap();

        // Same DOI, different title: must update the same row.
        let mut second = article("doi:10.1/x", "Published Title");
        second.doi = Some("10.1/x".to_string());
        repo.upsert_article(&second).await.unwrap();

        let rows = repo.article_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "doi:10.1/x");
        assert_eq!(rows[0].title, "Published Title");
    }

    #[tokio::test]
    async fn test_update_never_erases_known_values_with_absent_ones() {
        let repo = MemoryGraphRepository::new();

        let mut full = article("doi:10.1/y", "A Paper");
        full.doi = Some("10.1/y".to_string());
        full.abstract_text = Some("Known abstract".to_string());
        full.venue = Some("NeurIPS".to_string());
        repo.upsert_article(&full).await.unwrap();

        // A later partial observation without abstract or venue.
        let mut partial = article("doi:10.1/y", "A Paper");
        partial.doi = Some("10.1/y".to_string());
        repo.upsert_article(&partial).await.unwrap();

        let rows = repo.article_rows();
        assert_eq!(rows[0].abstract_text.as_deref(), Some("Known abstract"));
        assert_eq!(rows[0].venue.as_deref(), Some("NeurIPS"));
    }

    #[tokio::test]
    async fn test_resolution_falls_back_to_arxiv_then_title() {
        let repo = MemoryGraphRepository::new();

        let mut preprint = article("arxiv:2101.00001", "A Preprint");
        preprint.arxiv_id = Some("2101.00001".to_string());
        repo.upsert_article(&preprint).await.unwrap();

        // Acquires a DOI later; still resolves to the same row via arxiv_id.
        let mut published = article("doi:10.1/z", "A Preprint");
        published.doi = Some("10.1/z".to_string());
        published.arxiv_id = Some("2101.00001".to_string());
        repo.upsert_article(&published).await.unwrap();

        assert_eq!(repo.article_rows().len(), 1);
        assert_eq!(repo.article_rows()[0].doi.as_deref(), Some("10.1/z"));
    }
}
