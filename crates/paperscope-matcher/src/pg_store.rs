//! PostgreSQL implementation of the match store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::{ArticleMatch, MatchStore};

#[derive(Clone)]
pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply this crate's schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("match migrations failed")?;
        Ok(())
    }
}

fn string_vec(value: serde_json::Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

fn row_to_match(row: &PgRow) -> Result<ArticleMatch> {
    Ok(ArticleMatch {
        article_id: row.try_get("article_id")?,
        question_id: row.try_get("question_id")?,
        relevance_score: row.try_get("relevance_score")?,
        matched_keywords: string_vec(row.try_get("matched_keywords")?),
        matched_topics: string_vec(row.try_get("matched_topics")?),
        matched_authors: string_vec(row.try_get("matched_authors")?),
        reasoning: row.try_get("reasoning")?,
        user_sentiment: row.try_get("user_sentiment")?,
        viewed: row.try_get("viewed")?,
        bookmarked: row.try_get("bookmarked")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn find(
        &self,
        article_id: &str,
        question_id: Uuid,
    ) -> Result<Option<ArticleMatch>> {
        let row = sqlx::query(
            "SELECT * FROM article_matches WHERE article_id = $1 AND question_id = $2",
        )
        .bind(article_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await
        .context("match lookup failed")?;
        row.as_ref().map(row_to_match).transpose()
    }

    async fn insert(&self, m: &ArticleMatch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO article_matches
                (article_id, question_id, relevance_score, matched_keywords,
                 matched_topics, matched_authors, reasoning, user_sentiment,
                 viewed, bookmarked, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            ON CONFLICT (article_id, question_id) DO NOTHING
            "#,
        )
        .bind(&m.article_id)
        .bind(m.question_id)
        .bind(m.relevance_score)
        .bind(serde_json::to_value(&m.matched_keywords)?)
        .bind(serde_json::to_value(&m.matched_topics)?)
        .bind(serde_json::to_value(&m.matched_authors)?)
        .bind(&m.reasoning)
        .bind(&m.user_sentiment)
        .bind(m.viewed)
        .bind(m.bookmarked)
        .bind(m.created_at)
        .execute(&self.pool)
        .await
        .context("match insert failed")?;
        Ok(())
    }

    async fn list_for_question(&self, question_id: Uuid) -> Result<Vec<ArticleMatch>> {
        let rows = sqlx::query(
            "SELECT * FROM article_matches WHERE question_id = $1 ORDER BY relevance_score DESC",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
        .context("match list failed")?;
        rows.iter().map(row_to_match).collect()
    }

    async fn set_sentiment(
        &self,
        article_id: &str,
        question_id: Uuid,
        sentiment: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE article_matches SET user_sentiment = $3
             WHERE article_id = $1 AND question_id = $2",
        )
        .bind(article_id)
        .bind(question_id)
        .bind(sentiment)
        .execute(&self.pool)
        .await
        .context("set_sentiment failed")?;
        Ok(())
    }

    async fn mark_viewed(&self, article_id: &str, question_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE article_matches SET viewed = TRUE
             WHERE article_id = $1 AND question_id = $2",
        )
        .bind(article_id)
        .bind(question_id)
        .execute(&self.pool)
        .await
        .context("mark_viewed failed")?;
        Ok(())
    }

    async fn set_bookmarked(
        &self,
        article_id: &str,
        question_id: Uuid,
        bookmarked: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE article_matches SET bookmarked = $3
             WHERE article_id = $1 AND question_id = $2",
        )
        .bind(article_id)
        .bind(question_id)
        .bind(bookmarked)
        .execute(&self.pool)
        .await
        .context("set_bookmarked failed")?;
        Ok(())
    }
}
