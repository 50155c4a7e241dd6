//! Typed node and edge payloads for the citation graph.

use chrono::{DateTime, NaiveDate, Utc};
use paperscope_common::identity::{resolve_identity, IdentitySignals};
use serde::{Deserialize, Serialize};

/// A graph node: the merged view of every observation of one article.
///
/// Created on first sight, updated (never replaced wholesale) on every
/// subsequent observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalArticle {
    /// Canonical identity key (`doi:` / `arxiv:` / `title:` / fallback).
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub venue: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    pub keywords: Vec<String>,
    /// Analysis payload produced by an external analysis pass.
    pub analysis: Option<serde_json::Value>,
    /// Model that produced the analysis payload.
    pub analysis_model: Option<String>,
    pub pdf_path: Option<String>,
    pub markdown_path: Option<String>,
    /// Reference to the rendered note, if any.
    pub note_path: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl CanonicalArticle {
    pub fn new(id: impl Into<String>, metadata: ArticleMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: metadata.title,
            authors: metadata.authors,
            abstract_text: metadata.abstract_text,
            doi: metadata.doi,
            arxiv_id: metadata.arxiv_id,
            venue: metadata.venue,
            publication_date: metadata.publication_date,
            url: metadata.url,
            pdf_url: metadata.pdf_url,
            keywords: metadata.keywords,
            analysis: None,
            analysis_model: None,
            pdf_path: None,
            markdown_path: None,
            note_path: None,
            first_seen: now,
            last_updated: now,
        }
    }

    /// Merge a new observation onto this node. Update, not replace: present
    /// values win, absent values leave what is already known. Keywords
    /// accumulate across observations.
    ///
    /// Returns true if any attribute actually changed.
    pub fn merge_metadata(&mut self, metadata: &ArticleMetadata) -> bool {
        let before = self.clone();

        if !metadata.title.is_empty() {
            self.title = metadata.title.clone();
        }
        if !metadata.authors.is_empty() {
            self.authors = metadata.authors.clone();
        }
        merge_option(&mut self.abstract_text, &metadata.abstract_text);
        merge_option(&mut self.doi, &metadata.doi);
        merge_option(&mut self.arxiv_id, &metadata.arxiv_id);
        merge_option(&mut self.venue, &metadata.venue);
        if metadata.publication_date.is_some() {
            self.publication_date = metadata.publication_date;
        }
        merge_option(&mut self.url, &metadata.url);
        merge_option(&mut self.pdf_url, &metadata.pdf_url);
        for kw in &metadata.keywords {
            if !self.keywords.contains(kw) {
                self.keywords.push(kw.clone());
            }
        }

        let changed = before_ne(&before, self);
        if changed {
            self.last_updated = Utc::now();
        }
        changed
    }

    /// Attach file-path references. Present paths win, absent paths keep.
    pub fn merge_paths(&mut self, paths: &ArticlePaths) -> bool {
        let before = self.clone();
        merge_option(&mut self.pdf_path, &paths.pdf_path);
        merge_option(&mut self.markdown_path, &paths.markdown_path);
        let changed = before_ne(&before, self);
        if changed {
            self.last_updated = Utc::now();
        }
        changed
    }

    /// Attach an analysis payload and the model that produced it.
    pub fn merge_analysis(
        &mut self,
        analysis: Option<&serde_json::Value>,
        model: Option<&str>,
    ) -> bool {
        let before = self.clone();
        if let Some(a) = analysis {
            self.analysis = Some(a.clone());
        }
        if let Some(m) = model {
            self.analysis_model = Some(m.to_string());
        }
        let changed = before_ne(&before, self);
        if changed {
            self.last_updated = Utc::now();
        }
        changed
    }
}

/// Compare ignoring the `last_updated` stamp, which only moves on change.
fn before_ne(before: &CanonicalArticle, after: &CanonicalArticle) -> bool {
    let mut b = before.clone();
    b.last_updated = after.last_updated;
    b != *after
}

fn merge_option(existing: &mut Option<String>, incoming: &Option<String>) {
    if let Some(v) = incoming {
        if !v.is_empty() {
            *existing = Some(v.clone());
        }
    }
}

/// The metadata slice of an article observation, as handed to `add_article`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub venue: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticlePaths {
    pub pdf_path: Option<String>,
    pub markdown_path: Option<String>,
}

/// Edge payload: what the citing document says about the cited one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CitationData {
    /// Raw citation text as extracted.
    pub text: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    /// Marked influential by the extraction pass.
    pub influential: bool,
    /// Position in the citing document's reference list.
    pub order: Option<i32>,
}

impl CitationData {
    /// Merge a re-observed edge payload onto this one. Present values win,
    /// the influential flag is sticky once set.
    pub fn merge(&mut self, incoming: &CitationData) -> bool {
        let before = self.clone();
        if incoming.text.is_some() {
            self.text = incoming.text.clone();
        }
        if incoming.title.is_some() {
            self.title = incoming.title.clone();
        }
        if !incoming.authors.is_empty() {
            self.authors = incoming.authors.clone();
        }
        if incoming.year.is_some() {
            self.year = incoming.year;
        }
        if incoming.venue.is_some() {
            self.venue = incoming.venue.clone();
        }
        self.influential |= incoming.influential;
        if incoming.order.is_some() {
            self.order = incoming.order;
        }
        *self != before
    }
}

/// One entry from a citation-extraction pass over a document, consumed by
/// `process_citations`. Exactly one entry should be flagged as the document
/// itself; that precondition is owed by the extraction collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitationEntry {
    pub is_document_citation: bool,
    pub title: String,
    pub authors: Vec<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub backup_id: Option<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub text: Option<String>,
    pub influential: bool,
}

impl CitationEntry {
    /// Canonical key for this entry.
    pub fn canonical_id(&self) -> String {
        resolve_identity(&IdentitySignals {
            doi: self.doi.as_deref(),
            arxiv_id: self.arxiv_id.as_deref(),
            backup_id: self.backup_id.as_deref(),
            title: if self.title.is_empty() { None } else { Some(&self.title) },
            first_author: self.authors.first().map(String::as_str),
        })
    }

    pub fn to_metadata(&self) -> ArticleMetadata {
        ArticleMetadata {
            title: self.title.clone(),
            authors: self.authors.clone(),
            doi: self.doi.clone(),
            arxiv_id: self.arxiv_id.clone(),
            venue: self.venue.clone(),
            ..Default::default()
        }
    }

    /// Edge payload for the primary → cited edge, with the entry's position
    /// in the reference list.
    pub fn to_citation_data(&self, order: i32) -> CitationData {
        CitationData {
            text: self.text.clone(),
            title: Some(self.title.clone()),
            authors: self.authors.clone(),
            year: self.year,
            venue: self.venue.clone(),
            influential: self.influential,
            order: Some(order),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(title: &str) -> ArticleMetadata {
        ArticleMetadata { title: title.to_string(), ..Default::default() }
    }

    #[test]
    fn test_merge_keeps_existing_when_incoming_absent() {
        let mut article = CanonicalArticle::new(
            "doi:10.1/a",
            ArticleMetadata {
                title: "Original".to_string(),
                doi: Some("10.1/a".to_string()),
                abstract_text: Some("An abstract.".to_string()),
                ..Default::default()
            },
        );
        let changed = article.merge_metadata(&metadata("Original"));
        assert!(!changed);
        assert_eq!(article.abstract_text.as_deref(), Some("An abstract."));
        assert_eq!(article.doi.as_deref(), Some("10.1/a"));
    }

    #[test]
    fn test_merge_accumulates_keywords() {
        let mut article = CanonicalArticle::new(
            "arxiv:1706.03762",
            ArticleMetadata {
                title: "Attention Is All You Need".to_string(),
                keywords: vec!["attention".to_string()],
                ..Default::default()
            },
        );
        let update = ArticleMetadata {
            title: "Attention Is All You Need".to_string(),
            keywords: vec!["attention".to_string(), "transformer".to_string()],
            ..Default::default()
        };
        assert!(article.merge_metadata(&update));
        assert_eq!(article.keywords, vec!["attention", "transformer"]);
    }

    #[test]
    fn test_identical_merge_reports_unchanged() {
        let meta = ArticleMetadata {
            title: "Stable".to_string(),
            authors: vec!["Doe, J.".to_string()],
            doi: Some("10.1/stable".to_string()),
            ..Default::default()
        };
        let mut article = CanonicalArticle::new("doi:10.1/stable", meta.clone());
        assert!(!article.merge_metadata(&meta));
        assert!(!article.merge_metadata(&meta));
    }

    #[test]
    fn test_citation_data_influential_is_sticky() {
        let mut data = CitationData { influential: true, ..Default::default() };
        let incoming = CitationData { year: Some(2020), ..Default::default() };
        data.merge(&incoming);
        assert!(data.influential);
        assert_eq!(data.year, Some(2020));
    }

    #[test]
    fn test_entry_canonical_id_prefers_doi() {
        let entry = CitationEntry {
            title: "Some Cited Paper".to_string(),
            doi: Some("10.5/Cited".to_string()),
            arxiv_id: Some("2101.00001".to_string()),
            ..Default::default()
        };
        assert_eq!(entry.canonical_id(), "doi:10.5/cited");
    }
}
