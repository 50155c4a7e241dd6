//! PostgreSQL implementation of the question repository.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use paperscope_common::ResearchQuestion;

use crate::repository::{DiscoveryRunRecord, QuestionRepository};

#[derive(Clone)]
pub struct PgQuestionRepository {
    pool: PgPool,
}

impl PgQuestionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply this crate's schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("question migrations failed")?;
        Ok(())
    }
}

fn string_vec(value: serde_json::Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

fn row_to_question(row: &PgRow) -> Result<ResearchQuestion> {
    Ok(ResearchQuestion {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        keywords: string_vec(row.try_get("keywords")?),
        topics: string_vec(row.try_get("topics")?),
        authors: string_vec(row.try_get("authors")?),
        selected_sources: string_vec(row.try_get("selected_sources")?),
        min_relevance_score: row.try_get("min_relevance_score")?,
        schedule: row.try_get("schedule")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl QuestionRepository for PgQuestionRepository {
    async fn get_question(&self, id: Uuid) -> Result<Option<ResearchQuestion>> {
        let row = sqlx::query("SELECT * FROM research_questions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("question lookup failed")?;
        row.as_ref().map(row_to_question).transpose()
    }

    async fn list_active_questions(&self) -> Result<Vec<ResearchQuestion>> {
        let rows = sqlx::query(
            "SELECT * FROM research_questions WHERE active ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .context("question list failed")?;
        rows.iter().map(row_to_question).collect()
    }

    async fn upsert_question(&self, q: &ResearchQuestion) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO research_questions
                (id, name, keywords, topics, authors, selected_sources,
                 min_relevance_score, schedule, active, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            ON CONFLICT (id) DO UPDATE SET
                name                = EXCLUDED.name,
                keywords            = EXCLUDED.keywords,
                topics              = EXCLUDED.topics,
                authors             = EXCLUDED.authors,
                selected_sources    = EXCLUDED.selected_sources,
                min_relevance_score = EXCLUDED.min_relevance_score,
                schedule            = EXCLUDED.schedule,
                active              = EXCLUDED.active
            "#,
        )
        .bind(q.id)
        .bind(&q.name)
        .bind(serde_json::to_value(&q.keywords)?)
        .bind(serde_json::to_value(&q.topics)?)
        .bind(serde_json::to_value(&q.authors)?)
        .bind(serde_json::to_value(&q.selected_sources)?)
        .bind(q.min_relevance_score)
        .bind(&q.schedule)
        .bind(q.active)
        .bind(q.created_at)
        .execute(&self.pool)
        .await
        .context("question upsert failed")?;
        Ok(())
    }

    async fn record_run(&self, run: &DiscoveryRunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO discovery_runs
                (id, question_id, success, articles_found, articles_processed,
                 articles_matched, sources_queried, errors, duration_ms, finished_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
        .bind(run.id)
        .bind(run.question_id)
        .bind(run.success)
        .bind(run.articles_found)
        .bind(run.articles_processed)
        .bind(run.articles_matched)
        .bind(serde_json::to_value(&run.sources_queried)?)
        .bind(serde_json::to_value(&run.errors)?)
        .bind(run.duration_ms)
        .bind(run.finished_at)
        .execute(&self.pool)
        .await
        .context("run record insert failed")?;
        Ok(())
    }
}
