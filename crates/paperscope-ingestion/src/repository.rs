//! Research question storage and discovery-run audit records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use paperscope_common::ResearchQuestion;

/// Audit record for one completed discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRunRecord {
    pub id: Uuid,
    pub question_id: Uuid,
    pub success: bool,
    pub articles_found: i64,
    pub articles_processed: i64,
    pub articles_matched: i64,
    pub sources_queried: Vec<String>,
    pub errors: Vec<String>,
    pub duration_ms: i64,
    pub finished_at: DateTime<Utc>,
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn get_question(&self, id: Uuid) -> anyhow::Result<Option<ResearchQuestion>>;

    async fn list_active_questions(&self) -> anyhow::Result<Vec<ResearchQuestion>>;

    async fn upsert_question(&self, question: &ResearchQuestion) -> anyhow::Result<()>;

    /// Append-only run audit log.
    async fn record_run(&self, run: &DiscoveryRunRecord) -> anyhow::Result<()>;
}
