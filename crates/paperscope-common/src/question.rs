//! Standing research questions.
//!
//! A question describes what a user is watching the literature for: keywords,
//! topics, preferred authors, which discovery sources to query, and the
//! relevance threshold a new article must clear to be persisted as a match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchQuestion {
    pub id: Uuid,

    /// Human-readable name, included in scoring prompts.
    pub name: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub topics: Vec<String>,

    /// Preferred authors; a match on one of these is reported back.
    #[serde(default)]
    pub authors: Vec<String>,

    /// Source names to query. `["*"]` expands to every registered source.
    #[serde(default = "default_sources")]
    pub selected_sources: Vec<String>,

    /// Inclusive threshold: a score equal to this value is a match.
    #[serde(default = "default_min_relevance")]
    pub min_relevance_score: f64,

    /// Optional schedule expression, interpreted by the caller's scheduler.
    #[serde(default)]
    pub schedule: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_sources() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_min_relevance() -> f64 {
    0.6
}
fn default_true() -> bool {
    true
}

impl ResearchQuestion {
    /// Create a question with defaults (all sources, 0.6 threshold).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            keywords: Vec::new(),
            topics: Vec::new(),
            authors: Vec::new(),
            selected_sources: default_sources(),
            min_relevance_score: default_min_relevance(),
            schedule: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_sources(mut self, sources: &[&str]) -> Self {
        self.selected_sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_min_relevance(mut self, threshold: f64) -> Self {
        self.min_relevance_score = threshold;
        self
    }

    /// Whether the question asks for every registered source.
    pub fn wants_all_sources(&self) -> bool {
        self.selected_sources.iter().any(|s| s == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let q = ResearchQuestion::new("transformer efficiency");
        assert!(q.wants_all_sources());
        assert_eq!(q.min_relevance_score, 0.6);
        assert!(q.active);
    }

    #[test]
    fn test_explicit_sources_do_not_expand() {
        let q = ResearchQuestion::new("q").with_sources(&["arxiv", "crossref"]);
        assert!(!q.wants_all_sources());
        assert_eq!(q.selected_sources.len(), 2);
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let q: ResearchQuestion = serde_json::from_str(
            r#"{"id":"9f9b4c1e-8f3a-4a8e-9a59-111111111111","name":"sparse attention"}"#,
        )
        .unwrap();
        assert_eq!(q.selected_sources, vec!["*".to_string()]);
        assert_eq!(q.min_relevance_score, 0.6);
    }
}
