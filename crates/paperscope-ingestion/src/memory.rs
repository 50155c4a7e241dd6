//! In-memory `QuestionRepository` for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use paperscope_common::ResearchQuestion;

use crate::repository::{DiscoveryRunRecord, QuestionRepository};

#[derive(Default)]
pub struct MemoryQuestionRepository {
    questions: Mutex<HashMap<Uuid, ResearchQuestion>>,
    runs: Mutex<Vec<DiscoveryRunRecord>>,
}

impl MemoryQuestionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a question and return its id.
    pub fn seed(&self, question: ResearchQuestion) -> Uuid {
        let id = question.id;
        self.questions.lock().unwrap().insert(id, question);
        id
    }

    pub fn runs(&self) -> Vec<DiscoveryRunRecord> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionRepository for MemoryQuestionRepository {
    async fn get_question(&self, id: Uuid) -> anyhow::Result<Option<ResearchQuestion>> {
        Ok(self.questions.lock().unwrap().get(&id).cloned())
    }

    async fn list_active_questions(&self) -> anyhow::Result<Vec<ResearchQuestion>> {
        let mut active: Vec<ResearchQuestion> = self
            .questions
            .lock()
            .unwrap()
            .values()
            .filter(|q| q.active)
            .cloned()
            .collect();
        active.sort_by_key(|q| q.created_at);
        Ok(active)
    }

    async fn upsert_question(&self, question: &ResearchQuestion) -> anyhow::Result<()> {
        self.questions
            .lock()
            .unwrap()
            .insert(question.id, question.clone());
        Ok(())
    }

    async fn record_run(&self, run: &DiscoveryRunRecord) -> anyhow::Result<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }
}
