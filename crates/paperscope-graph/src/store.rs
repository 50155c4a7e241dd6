//! The citation graph store: in-memory graph + persistence sync.
//!
//! The graph is authoritative between saves. `add_article` is an idempotent
//! upsert; `add_citation` requires both endpoints to exist and reports a
//! typed rejection otherwise; `process_citations` runs one extraction batch
//! (primary node, cited nodes, edges) with a single save at the end and then
//! regenerates notes for the primary's 1-hop neighborhood.
//!
//! Not designed for concurrent writers: one task drives a given store.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use paperscope_common::Result;

use crate::graph::CitationGraph;
use crate::model::{
    ArticleMetadata, ArticlePaths, CanonicalArticle, CitationData, CitationEntry,
};
use crate::notes::NoteRenderer;
use crate::repository::{ArticleSaveOutcome, GraphRepository, StoredCitation};

/// Why a citation edge was not added.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CitationRejection {
    #[error("citing article '{0}' is not in the graph")]
    MissingCiting(String),
    #[error("cited article '{0}' is not in the graph")]
    MissingCited(String),
    #[error("self-citation on '{0}'")]
    SelfCitation(String),
}

/// How the document's own entry was identified in a citation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef {
    /// An entry carried the `is_document_citation` flag.
    Flagged(usize),
    /// No entry was flagged; the first entry was used. The extraction
    /// collaborator owes us exactly one flagged entry, so this is logged.
    Fallback,
}

/// Summary of one `process_citations` batch.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub primary_id: String,
    pub document_ref: DocumentRef,
    pub nodes_added: usize,
    pub edges_added: usize,
    pub rejections: Vec<CitationRejection>,
    pub notes_regenerated: usize,
    pub save: SaveStats,
}

/// Summary of one save pass.
#[derive(Debug, Clone, Default)]
pub struct SaveStats {
    pub articles_inserted: usize,
    pub articles_updated: usize,
    pub articles_skipped: usize,
    pub citations_saved: usize,
}

pub struct CitationGraphStore {
    graph: CitationGraph,
    repo: Arc<dyn GraphRepository>,
    notes: Option<Arc<dyn NoteRenderer>>,
    batch_mode: bool,
    dirty_nodes: HashSet<String>,
    dirty_edges: HashSet<(String, String)>,
}

impl CitationGraphStore {
    pub fn new(repo: Arc<dyn GraphRepository>) -> Self {
        Self {
            graph: CitationGraph::new(),
            repo,
            notes: None,
            batch_mode: false,
            dirty_nodes: HashSet::new(),
            dirty_edges: HashSet::new(),
        }
    }

    pub fn with_note_renderer(mut self, notes: Arc<dyn NoteRenderer>) -> Self {
        self.notes = Some(notes);
        self
    }

    /// In batch mode, writes are deferred until [`save`](Self::save).
    pub fn set_batch_mode(&mut self, on: bool) {
        self.batch_mode = on;
    }

    // ── Sync ─────────────────────────────────────────────────────────────────

    /// Populate the in-memory graph from the relational store. Edges whose
    /// endpoints are missing are dropped (and logged), not errors.
    pub async fn load(&mut self) -> Result<()> {
        let articles = self.repo.load_articles().await?;
        for article in articles {
            self.graph.insert(article);
        }

        let citations = self.repo.load_citations().await?;
        let mut dropped = 0usize;
        for row in citations {
            if !self.graph.contains(&row.citing_id) || !self.graph.contains(&row.cited_id) {
                dropped += 1;
                continue;
            }
            self.graph.upsert_edge(&row.citing_id, &row.cited_id, row.data);
        }
        if dropped > 0 {
            warn!(dropped, "Dropped citation rows referencing missing articles");
        }

        info!(
            articles = self.graph.node_count(),
            citations = self.graph.edge_count(),
            "Citation graph loaded"
        );
        self.dirty_nodes.clear();
        self.dirty_edges.clear();
        Ok(())
    }

    /// Persist everything that changed since the last save. A clean graph
    /// performs no writes at all.
    pub async fn save(&mut self) -> Result<SaveStats> {
        let mut stats = SaveStats::default();

        let mut node_ids: Vec<String> = self.dirty_nodes.iter().cloned().collect();
        node_ids.sort();
        for id in node_ids {
            let article = match self.graph.get(&id) {
                Some(a) => a.clone(),
                None => {
                    self.dirty_nodes.remove(&id);
                    continue;
                }
            };
            match self.repo.upsert_article(&article).await? {
                ArticleSaveOutcome::Inserted => {
                    stats.articles_inserted += 1;
                    self.dirty_nodes.remove(&id);
                }
                ArticleSaveOutcome::Updated => {
                    stats.articles_updated += 1;
                    self.dirty_nodes.remove(&id);
                }
                ArticleSaveOutcome::SkippedConflict => {
                    // Left dirty; a later save retries.
                    stats.articles_skipped += 1;
                    warn!(article_id = %id, "Article save skipped after conflict retry");
                }
            }
        }

        let mut edge_keys: Vec<(String, String)> = self.dirty_edges.iter().cloned().collect();
        edge_keys.sort();
        for (citing, cited) in edge_keys {
            if let Some(data) = self.graph.edge(&citing, &cited) {
                self.repo.upsert_citation(&citing, &cited, data).await?;
                stats.citations_saved += 1;
            }
            self.dirty_edges.remove(&(citing, cited));
        }

        debug!(
            inserted = stats.articles_inserted,
            updated = stats.articles_updated,
            skipped = stats.articles_skipped,
            citations = stats.citations_saved,
            "Graph save complete"
        );
        Ok(stats)
    }

    // ── Mutation ─────────────────────────────────────────────────────────────

    /// Idempotent upsert of an article node. New attributes are merged onto
    /// any existing node (update, not replace), so repeated observations
    /// accumulate detail. Returns true if anything changed.
    ///
    /// Outside batch mode the node is persisted immediately; persistence
    /// failures are logged, never raised — the in-memory graph stays
    /// authoritative until the next successful save.
    pub async fn add_article(
        &mut self,
        id: &str,
        metadata: ArticleMetadata,
        paths: Option<&ArticlePaths>,
        analysis: Option<&serde_json::Value>,
        model: Option<&str>,
    ) -> bool {
        let changed = match self.graph.get_mut(id) {
            Some(existing) => {
                let mut changed = existing.merge_metadata(&metadata);
                if let Some(p) = paths {
                    changed |= existing.merge_paths(p);
                }
                changed |= existing.merge_analysis(analysis, model);
                changed
            }
            None => {
                let mut article = CanonicalArticle::new(id, metadata);
                if let Some(p) = paths {
                    article.merge_paths(p);
                }
                article.merge_analysis(analysis, model);
                self.graph.insert(article);
                true
            }
        };

        if changed {
            self.dirty_nodes.insert(id.to_string());
            if !self.batch_mode {
                self.persist_node(id).await;
            }
        }
        changed
    }

    /// Add a directed citation edge. Both endpoints must already exist and
    /// self-citations are disallowed; violations come back as a typed
    /// rejection for the caller to branch on. Re-adding an existing edge
    /// merges the payload onto the existing one.
    pub async fn add_citation(
        &mut self,
        citing_id: &str,
        cited_id: &str,
        data: Option<CitationData>,
    ) -> std::result::Result<bool, CitationRejection> {
        if citing_id == cited_id {
            return Err(CitationRejection::SelfCitation(citing_id.to_string()));
        }
        if !self.graph.contains(citing_id) {
            return Err(CitationRejection::MissingCiting(citing_id.to_string()));
        }
        if !self.graph.contains(cited_id) {
            return Err(CitationRejection::MissingCited(cited_id.to_string()));
        }

        let changed = self
            .graph
            .upsert_edge(citing_id, cited_id, data.unwrap_or_default());
        if changed {
            self.dirty_edges
                .insert((citing_id.to_string(), cited_id.to_string()));
            if !self.batch_mode {
                self.persist_edge(citing_id, cited_id).await;
            }
        }
        Ok(changed)
    }

    /// Process one citation-extraction batch for a document.
    ///
    /// The entry flagged `is_document_citation` becomes the primary node; if
    /// none is flagged the first entry is used and the ambiguity is logged.
    /// Every other entry is added as a node with a primary→cited edge, all
    /// persistence is deferred to a single save, and afterwards note
    /// artifacts are regenerated for every node exactly one hop from the
    /// primary in either direction.
    #[instrument(skip(self, analysis, citations), fields(n_citations = citations.len()))]
    pub async fn process_citations(
        &mut self,
        pdf_path: &str,
        markdown_path: &str,
        analysis: serde_json::Value,
        citations: Vec<CitationEntry>,
    ) -> Result<ProcessOutcome> {
        if citations.is_empty() {
            warn!("process_citations called with no entries");
            return Ok(ProcessOutcome {
                primary_id: String::new(),
                document_ref: DocumentRef::Fallback,
                nodes_added: 0,
                edges_added: 0,
                rejections: Vec::new(),
                notes_regenerated: 0,
                save: SaveStats::default(),
            });
        }

        let document_ref = match citations.iter().position(|c| c.is_document_citation) {
            Some(idx) => DocumentRef::Flagged(idx),
            None => {
                warn!("No citation flagged as the document itself; using first entry");
                DocumentRef::Fallback
            }
        };
        let primary_idx = match document_ref {
            DocumentRef::Flagged(idx) => idx,
            DocumentRef::Fallback => 0,
        };

        let was_batch = self.batch_mode;
        self.batch_mode = true;

        let primary = &citations[primary_idx];
        let primary_id = primary.canonical_id();
        let paths = ArticlePaths {
            pdf_path: Some(pdf_path.to_string()),
            markdown_path: Some(markdown_path.to_string()),
        };
        self.add_article(
            &primary_id,
            primary.to_metadata(),
            Some(&paths),
            Some(&analysis),
            None,
        )
        .await;

        let mut nodes_added = 0usize;
        let mut edges_added = 0usize;
        let mut rejections = Vec::new();

        for (pos, entry) in citations.iter().enumerate() {
            if pos == primary_idx {
                continue;
            }
            let cited_id = entry.canonical_id();
            if cited_id == primary_id {
                warn!(article_id = %primary_id, "Citation entry resolves to the document itself; skipped");
                rejections.push(CitationRejection::SelfCitation(primary_id.clone()));
                continue;
            }

            if !self.graph.contains(&cited_id) {
                nodes_added += 1;
            }
            self.add_article(&cited_id, entry.to_metadata(), None, None, None)
                .await;

            match self
                .add_citation(&primary_id, &cited_id, Some(entry.to_citation_data(pos as i32)))
                .await
            {
                Ok(true) => edges_added += 1,
                Ok(false) => {}
                Err(rejection) => {
                    warn!(%rejection, "Citation edge rejected");
                    rejections.push(rejection);
                }
            }
        }

        self.batch_mode = was_batch;
        let save = self.save().await?;

        let notes_regenerated = self.regenerate_neighbor_notes(&primary_id).await;

        info!(
            primary = %primary_id,
            nodes_added,
            edges_added,
            notes_regenerated,
            "Citation batch processed"
        );

        Ok(ProcessOutcome {
            primary_id,
            document_ref,
            nodes_added,
            edges_added,
            rejections,
            notes_regenerated,
            save,
        })
    }

    /// Regenerate note artifacts for every node exactly one hop from
    /// `center`, in either direction. Render failures are logged and do not
    /// stop the remaining neighbors.
    async fn regenerate_neighbor_notes(&mut self, center: &str) -> usize {
        let renderer = match &self.notes {
            Some(r) => Arc::clone(r),
            None => return 0,
        };

        let mut regenerated = 0usize;
        for neighbor_id in self.graph.neighborhood(center, 1) {
            let (pdf_path, markdown_path, analysis) = match self.graph.get(&neighbor_id) {
                Some(article) => (
                    article.pdf_path.clone(),
                    article.markdown_path.clone(),
                    article.analysis.clone(),
                ),
                None => continue,
            };
            let outgoing: Vec<StoredCitation> = self
                .graph
                .edges()
                .filter(|(citing, _, _)| *citing == neighbor_id)
                .map(|(citing, cited, data)| StoredCitation {
                    citing_id: citing.to_string(),
                    cited_id: cited.to_string(),
                    data: data.clone(),
                })
                .collect();

            match renderer
                .create_note(
                    pdf_path.as_deref(),
                    markdown_path.as_deref(),
                    analysis.as_ref(),
                    &outgoing,
                )
                .await
            {
                Ok(artifacts) => {
                    if let Some(article) = self.graph.get_mut(&neighbor_id) {
                        article.note_path = Some(artifacts.note_path);
                        if let Some(p) = artifacts.pdf_path {
                            article.pdf_path = Some(p);
                        }
                        if let Some(p) = artifacts.markdown_path {
                            article.markdown_path = Some(p);
                        }
                    }
                    self.dirty_nodes.insert(neighbor_id.clone());
                    if !self.batch_mode {
                        self.persist_node(&neighbor_id).await;
                    }
                    regenerated += 1;
                }
                Err(e) => {
                    warn!(article_id = %neighbor_id, error = %e, "Note regeneration failed");
                }
            }
        }
        regenerated
    }

    // ── Non-batch persistence (caught, logged, never raised) ────────────────

    async fn persist_node(&mut self, id: &str) {
        let article = match self.graph.get(id) {
            Some(a) => a.clone(),
            None => return,
        };
        match self.repo.upsert_article(&article).await {
            Ok(ArticleSaveOutcome::SkippedConflict) => {
                warn!(article_id = %id, "Article save skipped after conflict retry");
            }
            Ok(_) => {
                self.dirty_nodes.remove(id);
            }
            Err(e) => {
                warn!(article_id = %id, error = %e, "Article persistence failed; graph remains authoritative");
            }
        }
    }

    async fn persist_edge(&mut self, citing: &str, cited: &str) {
        let data = match self.graph.edge(citing, cited) {
            Some(d) => d.clone(),
            None => return,
        };
        match self.repo.upsert_citation(citing, cited, &data).await {
            Ok(()) => {
                self.dirty_edges
                    .remove(&(citing.to_string(), cited.to_string()));
            }
            Err(e) => {
                warn!(citing, cited, error = %e, "Citation persistence failed; graph remains authoritative");
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn article(&self, id: &str) -> Option<&CanonicalArticle> {
        self.graph.get(id)
    }

    pub fn article_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn citation_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Articles that cite `id`.
    pub fn get_citing_articles(&self, id: &str) -> Vec<&CanonicalArticle> {
        self.graph.predecessors(id)
    }

    /// Articles that `id` cites.
    pub fn get_cited_articles(&self, id: &str) -> Vec<&CanonicalArticle> {
        self.graph.successors(id)
    }

    /// Bounded bidirectional closure around `id`, with the edges among the
    /// included nodes.
    pub fn get_citation_network(&self, id: &str, depth: usize) -> CitationNetwork {
        let mut node_ids = self.graph.neighborhood(id, depth);
        if self.graph.contains(id) {
            node_ids.insert(0, id.to_string());
        }
        let included: HashSet<&str> = node_ids.iter().map(String::as_str).collect();

        let nodes: Vec<CanonicalArticle> = node_ids
            .iter()
            .filter_map(|n| self.graph.get(n))
            .cloned()
            .collect();
        let edges: Vec<StoredCitation> = self
            .graph
            .edges()
            .filter(|(citing, cited, _)| included.contains(citing) && included.contains(cited))
            .map(|(citing, cited, data)| StoredCitation {
                citing_id: citing.to_string(),
                cited_id: cited.to_string(),
                data: data.clone(),
            })
            .collect();

        CitationNetwork { center: id.to_string(), nodes, edges }
    }

    /// Case-insensitive substring search over titles and authors.
    pub fn search_articles(&self, query: &str) -> Vec<&CanonicalArticle> {
        self.graph.search(query)
    }
}

/// A bounded subgraph around one article.
#[derive(Debug, Clone)]
pub struct CitationNetwork {
    pub center: String,
    pub nodes: Vec<CanonicalArticle>,
    pub edges: Vec<StoredCitation>,
}
