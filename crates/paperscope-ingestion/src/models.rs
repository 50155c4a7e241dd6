//! Raw bibliographic records as returned by discovery sources.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use paperscope_common::identity::IdentitySignals;
use paperscope_graph::ArticleMetadata;

/// One record from one source query. Created per discovery run, consumed by
/// the deduplicator, and discarded after merging into the citation graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BibliographicRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    /// Identifier from a secondary lookup service (e.g. a Semantic Scholar
    /// paper id), already prefixed by that service's adapter.
    pub backup_id: Option<String>,
    pub venue: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    pub keywords: Vec<String>,
    /// Name of the source adapter that produced this record.
    pub source: String,
    pub scrape_timestamp: DateTime<Utc>,
    /// Genuinely source-specific extras; everything enumerable is a field.
    #[serde(default)]
    pub additional_metadata: HashMap<String, serde_json::Value>,
}

impl BibliographicRecord {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: Vec::new(),
            abstract_text: None,
            doi: None,
            arxiv_id: None,
            backup_id: None,
            venue: None,
            publication_date: None,
            url: None,
            pdf_url: None,
            keywords: Vec::new(),
            source: source.into(),
            scrape_timestamp: Utc::now(),
            additional_metadata: HashMap::new(),
        }
    }

    /// Signals for canonical identity resolution.
    pub fn identity_signals(&self) -> IdentitySignals<'_> {
        IdentitySignals {
            doi: self.doi.as_deref(),
            arxiv_id: self.arxiv_id.as_deref(),
            backup_id: self.backup_id.as_deref(),
            title: if self.title.is_empty() { None } else { Some(&self.title) },
            first_author: self.authors.first().map(String::as_str),
        }
    }

    /// The metadata slice handed to the citation graph on upsert.
    pub fn to_article_metadata(&self) -> ArticleMetadata {
        ArticleMetadata {
            title: self.title.clone(),
            authors: self.authors.clone(),
            abstract_text: self.abstract_text.clone(),
            doi: self.doi.clone(),
            arxiv_id: self.arxiv_id.clone(),
            venue: self.venue.clone(),
            publication_date: self.publication_date,
            url: self.url.clone(),
            pdf_url: self.pdf_url.clone(),
            keywords: self.keywords.clone(),
        }
    }
}
