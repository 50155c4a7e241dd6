//! Deduplication of records collected in one discovery run.
//!
//! Three independent lookup indices are maintained over the collected
//! records: normalized arXiv id, normalized DOI, and a normalized
//! "title + first author" key. An incoming record is checked against all
//! three; when more than one could match, precedence is ArXiv > DOI >
//! title/author. Matching records are merged field by field with a
//! deterministic, order-independent policy, and identifiers discovered
//! during a merge are back-filled into the indices so later records can
//! match on them.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::models::BibliographicRecord;

lazy_static! {
    static ref ARXIV_VERSION: Regex = Regex::new(r"v\d+$").unwrap();
}

/// Key in `additional_metadata` accumulating every source a merged record
/// came from.
pub const MERGED_FROM_SOURCES: &str = "merged_from_sources";

#[derive(Default)]
pub struct RecordDeduplicator {
    records: Vec<BibliographicRecord>,
    by_arxiv: HashMap<String, usize>,
    by_doi: HashMap<String, usize>,
    by_title_author: HashMap<String, usize>,
}

impl RecordDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add one record, merging it into an existing one on an index hit.
    pub fn add(&mut self, record: BibliographicRecord) {
        let arxiv_key = record.arxiv_id.as_deref().map(normalize_arxiv);
        let doi_key = record.doi.as_deref().map(normalize_doi);
        let ta_key = title_author_key(&record);

        // ArXiv > DOI > title/author when several indices could match.
        let hit = arxiv_key
            .as_ref()
            .and_then(|k| self.by_arxiv.get(k))
            .or_else(|| doi_key.as_ref().and_then(|k| self.by_doi.get(k)))
            .or_else(|| ta_key.as_ref().and_then(|k| self.by_title_author.get(k)))
            .copied();

        let idx = match hit {
            Some(idx) => {
                debug!(title = %record.title, source = %record.source, "Merging duplicate record");
                merge_records(&mut self.records[idx], &record);
                idx
            }
            None => {
                self.records.push(record);
                self.records.len() - 1
            }
        };

        // Back-fill all three indices from the merged record: a DOI learned
        // just now must be matchable by the next record.
        let merged = &self.records[idx];
        if let Some(arxiv) = merged.arxiv_id.as_deref() {
            self.by_arxiv.entry(normalize_arxiv(arxiv)).or_insert(idx);
        }
        if let Some(doi) = merged.doi.as_deref() {
            self.by_doi.entry(normalize_doi(doi)).or_insert(idx);
        }
        if let Some(key) = title_author_key(merged) {
            self.by_title_author.entry(key).or_insert(idx);
        }
    }

    pub fn add_all(&mut self, records: impl IntoIterator<Item = BibliographicRecord>) {
        for record in records {
            self.add(record);
        }
    }

    pub fn into_records(self) -> Vec<BibliographicRecord> {
        self.records
    }
}

/// Deduplicate one run's records in arrival order.
pub fn deduplicate(records: Vec<BibliographicRecord>) -> Vec<BibliographicRecord> {
    let mut dedup = RecordDeduplicator::new();
    dedup.add_all(records);
    dedup.into_records()
}

// ── Normalization ─────────────────────────────────────────────────────────────

fn normalize_arxiv(id: &str) -> String {
    let trimmed = id.trim().to_lowercase();
    ARXIV_VERSION.replace(&trimmed, "").to_string()
}

fn normalize_doi(doi: &str) -> String {
    doi.trim().to_lowercase()
}

/// Lowercase, strip everything that is not a word character or whitespace,
/// collapse whitespace runs.
pub(crate) fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First author only: lowercase with collapsed whitespace.
fn normalize_author(author: &str) -> String {
    author
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_author_key(record: &BibliographicRecord) -> Option<String> {
    let title = normalize_title(&record.title);
    if title.is_empty() {
        return None;
    }
    let author = record
        .authors
        .first()
        .map(|a| normalize_author(a))
        .unwrap_or_default();
    Some(format!("{title}|{author}"))
}

// ── Merge policy ──────────────────────────────────────────────────────────────

/// Fold `incoming` into `existing`. Deterministic and order-independent:
/// longer strings win, identifier fields are fill-only, keyword lists union,
/// metadata maps shallow-merge with last write per key, and the newest
/// scrape timestamp is kept.
fn merge_records(existing: &mut BibliographicRecord, incoming: &BibliographicRecord) {
    keep_longer(&mut existing.title, &incoming.title);
    keep_longer_opt(&mut existing.abstract_text, &incoming.abstract_text);
    keep_longer_opt(&mut existing.venue, &incoming.venue);

    if incoming.authors.len() > existing.authors.len() {
        existing.authors = incoming.authors.clone();
    }
    for kw in &incoming.keywords {
        if !existing.keywords.contains(kw) {
            existing.keywords.push(kw.clone());
        }
    }

    fill_if_absent(&mut existing.doi, &incoming.doi);
    fill_if_absent(&mut existing.arxiv_id, &incoming.arxiv_id);
    fill_if_absent(&mut existing.backup_id, &incoming.backup_id);
    fill_if_absent(&mut existing.url, &incoming.url);
    fill_if_absent(&mut existing.pdf_url, &incoming.pdf_url);
    if existing.publication_date.is_none() {
        existing.publication_date = incoming.publication_date;
    }

    // Shallow merge, last write wins per key.
    for (key, value) in &incoming.additional_metadata {
        if key == MERGED_FROM_SOURCES {
            continue;
        }
        existing
            .additional_metadata
            .insert(key.clone(), value.clone());
    }
    append_merged_source(existing, &incoming.source);

    if incoming.scrape_timestamp > existing.scrape_timestamp {
        existing.scrape_timestamp = incoming.scrape_timestamp;
    }
}

fn keep_longer(existing: &mut String, incoming: &str) {
    if incoming.len() > existing.len() {
        *existing = incoming.to_string();
    }
}

fn keep_longer_opt(existing: &mut Option<String>, incoming: &Option<String>) {
    if let Some(new) = incoming {
        let longer = existing.as_ref().map(|e| new.len() > e.len()).unwrap_or(true);
        if longer {
            *existing = Some(new.clone());
        }
    }
}

fn fill_if_absent(existing: &mut Option<String>, incoming: &Option<String>) {
    if existing.is_none() {
        existing.clone_from(incoming);
    }
}

fn append_merged_source(record: &mut BibliographicRecord, new_source: &str) {
    let original_source = record.source.clone();
    let entry = record
        .additional_metadata
        .entry(MERGED_FROM_SOURCES.to_string())
        .or_insert_with(|| serde_json::json!([original_source]));
    if let Some(list) = entry.as_array_mut() {
        let already = list.iter().any(|v| v.as_str() == Some(new_source));
        if !already {
            list.push(serde_json::Value::String(new_source.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(title: &str, source: &str) -> BibliographicRecord {
        BibliographicRecord::new(title, source)
    }

    #[test]
    fn test_distinct_records_pass_through() {
        let deduped = deduplicate(vec![
            record("Paper One", "arxiv"),
            record("Paper Two", "arxiv"),
        ]);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_doi_match_across_sources() {
        let mut a = record("Short Title", "arxiv");
        a.doi = Some("10.1/X".to_string());
        let mut b = record("Short Title, Now With The Full Subtitle", "crossref");
        b.doi = Some("10.1/x".to_string());

        let deduped = deduplicate(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        // Longer title wins regardless of order.
        assert_eq!(deduped[0].title, "Short Title, Now With The Full Subtitle");
    }

    #[test]
    fn test_merge_is_order_independent_for_longer_fields() {
        let mut short = record("Ten chars.", "a");
        short.doi = Some("10.1/o".to_string());
        let mut long = record("Twenty characters!!!", "b");
        long.doi = Some("10.1/o".to_string());

        let ab = deduplicate(vec![short.clone(), long.clone()]);
        let ba = deduplicate(vec![long, short]);
        assert_eq!(ab[0].title, ba[0].title);
        assert_eq!(ab[0].title.len(), 20);
    }

    #[test]
    fn test_arxiv_version_insensitive_matching() {
        let mut v1 = record("A Preprint", "arxiv");
        v1.arxiv_id = Some("2101.00001v1".to_string());
        let mut v2 = record("A Preprint", "semanticscholar");
        v2.arxiv_id = Some("2101.00001v2".to_string());

        assert_eq!(deduplicate(vec![v1, v2]).len(), 1);
    }

    #[test]
    fn test_title_author_fallback_uses_first_author_only() {
        let mut a = record("Same Title", "arxiv");
        a.authors = vec!["Ada Lovelace".to_string(), "Charles Babbage".to_string()];
        let mut b = record("Same  Title!", "crossref");
        b.authors = vec!["ADA  LOVELACE".to_string()];

        assert_eq!(deduplicate(vec![a, b]).len(), 1);
    }

    #[test]
    fn test_same_title_different_first_author_not_merged() {
        let mut a = record("Common Title", "arxiv");
        a.authors = vec!["Ada Lovelace".to_string()];
        let mut b = record("Common Title", "crossref");
        b.authors = vec!["Grace Hopper".to_string()];

        assert_eq!(deduplicate(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_identifier_backfill_enables_transitive_merge() {
        // A shares an arXiv id with B; B shares a DOI with C; A and C share
        // nothing directly. All three must collapse into one record.
        let mut a = record("A Paper", "arxiv");
        a.arxiv_id = Some("2101.00001".to_string());

        let mut b = record("A Paper", "semanticscholar");
        b.arxiv_id = Some("2101.00001v2".to_string());
        b.doi = Some("10.1/abc".to_string());

        let mut c = record("A Paper (journal version)", "crossref");
        c.doi = Some("10.1/ABC".to_string());

        let deduped = deduplicate(vec![a, b, c]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].arxiv_id.as_deref(), Some("2101.00001"));
        assert_eq!(deduped[0].doi.as_deref(), Some("10.1/abc"));
    }

    #[test]
    fn test_existing_identifiers_are_not_overwritten() {
        let mut a = record("Paper", "arxiv");
        a.doi = Some("10.1/first".to_string());
        a.arxiv_id = Some("2101.00001".to_string());
        a.url = Some("https://arxiv.org/abs/2101.00001".to_string());

        let mut b = record("Paper", "crossref");
        b.arxiv_id = Some("2101.00001".to_string());
        b.doi = Some("10.1/other".to_string());
        b.url = Some("https://doi.org/10.1/other".to_string());

        let deduped = deduplicate(vec![a, b]);
        assert_eq!(deduped[0].doi.as_deref(), Some("10.1/first"));
        assert_eq!(deduped[0].url.as_deref(), Some("https://arxiv.org/abs/2101.00001"));
    }

    #[test]
    fn test_merged_sources_accumulate() {
        let mut a = record("Paper", "arxiv");
        a.doi = Some("10.1/m".to_string());
        let mut b = record("Paper", "crossref");
        b.doi = Some("10.1/m".to_string());
        let mut c = record("Paper", "semanticscholar");
        c.doi = Some("10.1/m".to_string());

        let deduped = deduplicate(vec![a, b, c]);
        let sources = deduped[0].additional_metadata[MERGED_FROM_SOURCES]
            .as_array()
            .unwrap()
            .clone();
        let names: Vec<&str> = sources.iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(names, vec!["arxiv", "crossref", "semanticscholar"]);
    }

    #[test]
    fn test_metadata_shallow_merge_last_write_wins() {
        let mut a = record("Paper", "arxiv");
        a.doi = Some("10.1/k".to_string());
        a.additional_metadata
            .insert("citation_count".to_string(), serde_json::json!(10));

        let mut b = record("Paper", "semanticscholar");
        b.doi = Some("10.1/k".to_string());
        b.additional_metadata
            .insert("citation_count".to_string(), serde_json::json!(42));

        let deduped = deduplicate(vec![a, b]);
        assert_eq!(deduped[0].additional_metadata["citation_count"], serde_json::json!(42));
    }

    #[test]
    fn test_newest_scrape_timestamp_kept() {
        let mut a = record("Paper", "arxiv");
        a.doi = Some("10.1/t".to_string());
        let mut b = record("Paper", "crossref");
        b.doi = Some("10.1/t".to_string());
        b.scrape_timestamp = a.scrape_timestamp + Duration::hours(2);
        let newest = b.scrape_timestamp;

        let deduped = deduplicate(vec![b, a]);
        assert_eq!(deduped[0].scrape_timestamp, newest);
    }

    #[test]
    fn test_keyword_union_deduplicates() {
        let mut a = record("Paper", "arxiv");
        a.doi = Some("10.1/kw".to_string());
        a.keywords = vec!["attention".to_string(), "nlp".to_string()];
        let mut b = record("Paper", "crossref");
        b.doi = Some("10.1/kw".to_string());
        b.keywords = vec!["nlp".to_string(), "transformer".to_string()];

        let deduped = deduplicate(vec![a, b]);
        assert_eq!(deduped[0].keywords, vec!["attention", "nlp", "transformer"]);
    }

    #[test]
    fn test_normalize_title_strips_punctuation() {
        assert_eq!(
            normalize_title("  BERT:  Pre-training, of Deep Models! "),
            "bert pretraining of deep models"
        );
    }
}
