//! Canonical identity resolution for bibliographic records.
//!
//! Every article node is addressed by exactly one canonical key. The key is
//! computed from the strongest identifier available, in priority order:
//!
//!   1. DOI                  → `doi:<lowercased doi>`
//!   2. arXiv id             → `arxiv:<id>` (version suffix stripped)
//!   3. backup id            → used verbatim (secondary lookup services)
//!   4. title                → `title:<sanitized slug>`
//!   5. first-author surname → `author:<surname>-<random suffix>`
//!   6. fully random id      → `record:<uuid>`
//!
//! Cases 1–4 are deterministic for identical inputs; 5 and 6 are explicitly
//! non-deterministic last resorts and are logged as such.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;
use uuid::Uuid;

lazy_static! {
    static ref ARXIV_VERSION: Regex = Regex::new(r"v\d+$").unwrap();
}

/// Identity signals extracted from any record kind (raw record, citation
/// entry, …). All fields are optional; the resolver walks the priority chain.
#[derive(Debug, Clone, Default)]
pub struct IdentitySignals<'a> {
    pub doi: Option<&'a str>,
    pub arxiv_id: Option<&'a str>,
    pub backup_id: Option<&'a str>,
    pub title: Option<&'a str>,
    pub first_author: Option<&'a str>,
}

/// Compute the canonical key for a set of identity signals.
pub fn resolve_identity(signals: &IdentitySignals) -> String {
    if let Some(doi) = non_empty(signals.doi) {
        return format!("doi:{}", doi.to_lowercase());
    }

    if let Some(arxiv) = non_empty(signals.arxiv_id) {
        let stripped = ARXIV_VERSION.replace(arxiv, "");
        return format!("arxiv:{stripped}");
    }

    if let Some(backup) = non_empty(signals.backup_id) {
        return backup.to_string();
    }

    if let Some(title) = non_empty(signals.title) {
        return format!("title:{}", sanitize_title(title));
    }

    if let Some(author) = non_empty(signals.first_author) {
        let surname = author
            .split_whitespace()
            .last()
            .unwrap_or(author)
            .to_lowercase();
        let suffix = short_suffix();
        warn!(surname = %surname, "No identifier or title; using low-confidence author key");
        return format!("author:{surname}-{suffix}");
    }

    let key = format!("record:{}", Uuid::new_v4().simple());
    warn!(key = %key, "Record carries no identity signals at all; assigned random key");
    key
}

/// Sanitize a title into a key slug: lowercase, non-alphanumeric characters
/// replaced with hyphens, runs collapsed to a single hyphen.
fn sanitize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let replaced: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    replaced
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn short_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
