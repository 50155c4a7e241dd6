//! Note-regeneration collaborator interface.
//!
//! Rendering itself (Obsidian vaults, templates) lives outside this crate;
//! the store only needs to ask for a note to be (re)created and record the
//! resulting paths.

use async_trait::async_trait;

use crate::repository::StoredCitation;

/// Paths produced by one note render.
#[derive(Debug, Clone)]
pub struct NoteArtifacts {
    pub note_path: String,
    pub pdf_path: Option<String>,
    pub markdown_path: Option<String>,
}

#[async_trait]
pub trait NoteRenderer: Send + Sync {
    /// Create or refresh the note for one article, given its file references,
    /// analysis payload, and outgoing citations.
    async fn create_note(
        &self,
        pdf_path: Option<&str>,
        markdown_path: Option<&str>,
        analysis: Option<&serde_json::Value>,
        citations: &[StoredCitation],
    ) -> anyhow::Result<NoteArtifacts>;
}
