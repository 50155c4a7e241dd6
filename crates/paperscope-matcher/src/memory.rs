//! In-memory `MatchStore` for tests and ephemeral runs.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::store::{ArticleMatch, MatchStore};

#[derive(Default)]
pub struct MemoryMatchStore {
    matches: Mutex<Vec<ArticleMatch>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.matches.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_match<R>(
        &self,
        article_id: &str,
        question_id: Uuid,
        f: impl FnOnce(&mut ArticleMatch) -> R,
    ) -> Option<R> {
        let mut matches = self.matches.lock().unwrap();
        matches
            .iter_mut()
            .find(|m| m.article_id == article_id && m.question_id == question_id)
            .map(f)
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn find(
        &self,
        article_id: &str,
        question_id: Uuid,
    ) -> anyhow::Result<Option<ArticleMatch>> {
        Ok(self
            .matches
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.article_id == article_id && m.question_id == question_id)
            .cloned())
    }

    async fn insert(&self, article_match: &ArticleMatch) -> anyhow::Result<()> {
        let mut matches = self.matches.lock().unwrap();
        let exists = matches.iter().any(|m| {
            m.article_id == article_match.article_id && m.question_id == article_match.question_id
        });
        if !exists {
            matches.push(article_match.clone());
        }
        Ok(())
    }

    async fn list_for_question(&self, question_id: Uuid) -> anyhow::Result<Vec<ArticleMatch>> {
        Ok(self
            .matches
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn set_sentiment(
        &self,
        article_id: &str,
        question_id: Uuid,
        sentiment: Option<&str>,
    ) -> anyhow::Result<()> {
        self.with_match(article_id, question_id, |m| {
            m.user_sentiment = sentiment.map(String::from);
        });
        Ok(())
    }

    async fn mark_viewed(&self, article_id: &str, question_id: Uuid) -> anyhow::Result<()> {
        self.with_match(article_id, question_id, |m| m.viewed = true);
        Ok(())
    }

    async fn set_bookmarked(
        &self,
        article_id: &str,
        question_id: Uuid,
        bookmarked: bool,
    ) -> anyhow::Result<()> {
        self.with_match(article_id, question_id, |m| m.bookmarked = bookmarked);
        Ok(())
    }
}
