//! PostgreSQL implementation of the graph repository.
//!
//! Save semantics:
//! - An existing row is resolved by doi, then arxiv_id, then title equality —
//!   a node may have first been seen under a weaker identifier and acquired a
//!   stronger one later.
//! - Updates use `COALESCE(new, old)` so a partial write never erases
//!   previously known column values.
//! - A unique-constraint violation on insert (concurrent-writer race) is
//!   retried once as an update against the now-visible row; a second failure
//!   is logged and that node's save is skipped.

use anyhow::{Context, Result};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::warn;

use async_trait::async_trait;

use crate::model::{CanonicalArticle, CitationData};
use crate::repository::{ArticleSaveOutcome, GraphRepository, StoredCitation};

#[derive(Clone)]
pub struct PgGraphRepository {
    pool: PgPool,
}

impl PgGraphRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply this crate's schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("graph migrations failed")?;
        Ok(())
    }

    /// Resolve the canonical_id of any existing row for this article, trying
    /// doi, then arxiv_id, then title.
    async fn resolve_existing(&self, article: &CanonicalArticle) -> Result<Option<String>> {
        if let Some(doi) = &article.doi {
            let hit: Option<String> =
                sqlx::query_scalar("SELECT canonical_id FROM articles WHERE doi = $1")
                    .bind(doi)
                    .fetch_optional(&self.pool)
                    .await
                    .context("resolve by doi failed")?;
            if hit.is_some() {
                return Ok(hit);
            }
        }
        if let Some(arxiv) = &article.arxiv_id {
            let hit: Option<String> =
                sqlx::query_scalar("SELECT canonical_id FROM articles WHERE arxiv_id = $1")
                    .bind(arxiv)
                    .fetch_optional(&self.pool)
                    .await
                    .context("resolve by arxiv_id failed")?;
            if hit.is_some() {
                return Ok(hit);
            }
        }
        let hit: Option<String> =
            sqlx::query_scalar("SELECT canonical_id FROM articles WHERE title = $1 LIMIT 1")
                .bind(&article.title)
                .fetch_optional(&self.pool)
                .await
                .context("resolve by title failed")?;
        Ok(hit)
    }

    async fn update_row(&self, existing_id: &str, article: &CanonicalArticle) -> Result<()> {
        let authors = serde_json::to_value(&article.authors)?;
        let keywords = serde_json::to_value(&article.keywords)?;

        sqlx::query(
            r#"
            UPDATE articles SET
                canonical_id     = $2,
                title            = COALESCE(NULLIF($3, ''), title),
                authors          = COALESCE(NULLIF($4::jsonb, '[]'::jsonb), authors),
                abstract_text    = COALESCE($5, abstract_text),
                doi              = COALESCE($6, doi),
                arxiv_id         = COALESCE($7, arxiv_id),
                venue            = COALESCE($8, venue),
                publication_date = COALESCE($9, publication_date),
                url              = COALESCE($10, url),
                pdf_url          = COALESCE($11, pdf_url),
                keywords         = COALESCE(NULLIF($12::jsonb, '[]'::jsonb), keywords),
                analysis         = COALESCE($13, analysis),
                analysis_model   = COALESCE($14, analysis_model),
                pdf_path         = COALESCE($15, pdf_path),
                markdown_path    = COALESCE($16, markdown_path),
                note_path        = COALESCE($17, note_path),
                last_updated     = now()
            WHERE canonical_id = $1
            "#,
        )
        .bind(existing_id)
        .bind(&article.id)
        .bind(&article.title)
        .bind(&authors)
        .bind(&article.abstract_text)
        .bind(&article.doi)
        .bind(&article.arxiv_id)
        .bind(&article.venue)
        .bind(article.publication_date)
        .bind(&article.url)
        .bind(&article.pdf_url)
        .bind(&keywords)
        .bind(&article.analysis)
        .bind(&article.analysis_model)
        .bind(&article.pdf_path)
        .bind(&article.markdown_path)
        .bind(&article.note_path)
        .execute(&self.pool)
        .await
        .context("article update failed")?;
        Ok(())
    }

    async fn insert_row(&self, article: &CanonicalArticle) -> std::result::Result<(), sqlx::Error> {
        let authors = serde_json::to_value(&article.authors).unwrap_or_default();
        let keywords = serde_json::to_value(&article.keywords).unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO articles
                (canonical_id, title, authors, abstract_text, doi, arxiv_id,
                 venue, publication_date, url, pdf_url, keywords, analysis,
                 analysis_model, pdf_path, markdown_path, note_path,
                 first_seen, last_updated)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)
            "#,
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&authors)
        .bind(&article.abstract_text)
        .bind(&article.doi)
        .bind(&article.arxiv_id)
        .bind(&article.venue)
        .bind(article.publication_date)
        .bind(&article.url)
        .bind(&article.pdf_url)
        .bind(&keywords)
        .bind(&article.analysis)
        .bind(&article.analysis_model)
        .bind(&article.pdf_path)
        .bind(&article.markdown_path)
        .bind(&article.note_path)
        .bind(article.first_seen)
        .bind(article.last_updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn string_vec(value: serde_json::Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

fn row_to_article(row: &PgRow) -> Result<CanonicalArticle> {
    Ok(CanonicalArticle {
        id: row.try_get("canonical_id")?,
        title: row.try_get("title")?,
        authors: string_vec(row.try_get("authors")?),
        abstract_text: row.try_get("abstract_text")?,
        doi: row.try_get("doi")?,
        arxiv_id: row.try_get("arxiv_id")?,
        venue: row.try_get("venue")?,
        publication_date: row.try_get("publication_date")?,
        url: row.try_get("url")?,
        pdf_url: row.try_get("pdf_url")?,
        keywords: string_vec(row.try_get("keywords")?),
        analysis: row.try_get("analysis")?,
        analysis_model: row.try_get("analysis_model")?,
        pdf_path: row.try_get("pdf_path")?,
        markdown_path: row.try_get("markdown_path")?,
        note_path: row.try_get("note_path")?,
        first_seen: row.try_get("first_seen")?,
        last_updated: row.try_get("last_updated")?,
    })
}

fn row_to_citation(row: &PgRow) -> Result<StoredCitation> {
    Ok(StoredCitation {
        citing_id: row.try_get("citing_id")?,
        cited_id: row.try_get("cited_id")?,
        data: CitationData {
            text: row.try_get("text")?,
            title: row.try_get("title")?,
            authors: string_vec(row.try_get("authors")?),
            year: row.try_get("year")?,
            venue: row.try_get("venue")?,
            influential: row.try_get("influential")?,
            order: row.try_get("citation_order")?,
        },
    })
}

#[async_trait]
impl GraphRepository for PgGraphRepository {
    async fn load_articles(&self) -> Result<Vec<CanonicalArticle>> {
        let rows = sqlx::query("SELECT * FROM articles")
            .fetch_all(&self.pool)
            .await
            .context("load_articles failed")?;
        rows.iter().map(row_to_article).collect()
    }

    async fn load_citations(&self) -> Result<Vec<StoredCitation>> {
        let rows = sqlx::query("SELECT * FROM citations")
            .fetch_all(&self.pool)
            .await
            .context("load_citations failed")?;
        rows.iter().map(row_to_citation).collect()
    }

    async fn upsert_article(&self, article: &CanonicalArticle) -> Result<ArticleSaveOutcome> {
        if let Some(existing_id) = self.resolve_existing(article).await? {
            self.update_row(&existing_id, article).await?;
            return Ok(ArticleSaveOutcome::Updated);
        }

        match self.insert_row(article).await {
            Ok(()) => Ok(ArticleSaveOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => {
                // Concurrent writer inserted the same identity between our
                // resolve and insert. Retry exactly once as an update.
                match self.resolve_existing(article).await? {
                    Some(existing_id) => match self.update_row(&existing_id, article).await {
                        Ok(()) => Ok(ArticleSaveOutcome::Updated),
                        Err(e2) => {
                            warn!(article_id = %article.id, error = %e2, "Conflict retry failed");
                            Ok(ArticleSaveOutcome::SkippedConflict)
                        }
                    },
                    None => {
                        warn!(article_id = %article.id, "Conflicting row not visible on retry");
                        Ok(ArticleSaveOutcome::SkippedConflict)
                    }
                }
            }
            Err(e) => Err(e).context("article insert failed"),
        }
    }

    async fn upsert_citation(
        &self,
        citing_id: &str,
        cited_id: &str,
        data: &CitationData,
    ) -> Result<()> {
        let authors = serde_json::to_value(&data.authors)?;
        sqlx::query(
            r#"
            INSERT INTO citations
                (citing_id, cited_id, text, title, authors, year, venue,
                 influential, citation_order)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            ON CONFLICT (citing_id, cited_id) DO UPDATE SET
                text           = COALESCE(EXCLUDED.text, citations.text),
                title          = COALESCE(EXCLUDED.title, citations.title),
                authors        = COALESCE(NULLIF(EXCLUDED.authors, '[]'::jsonb), citations.authors),
                year           = COALESCE(EXCLUDED.year, citations.year),
                venue          = COALESCE(EXCLUDED.venue, citations.venue),
                influential    = citations.influential OR EXCLUDED.influential,
                citation_order = COALESCE(EXCLUDED.citation_order, citations.citation_order)
            "#,
        )
        .bind(citing_id)
        .bind(cited_id)
        .bind(&data.text)
        .bind(&data.title)
        .bind(&authors)
        .bind(data.year)
        .bind(&data.venue)
        .bind(data.influential)
        .bind(data.order)
        .execute(&self.pool)
        .await
        .context("citation upsert failed")?;
        Ok(())
    }
}
