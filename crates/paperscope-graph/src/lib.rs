//! paperscope-graph — The citation graph store.
//!
//! An in-memory directed graph of articles and citations, synchronized to a
//! relational store with conflict-tolerant, COALESCE-style upserts. The
//! in-memory graph is authoritative between saves; persistence failures on
//! individual nodes never poison a batch.

pub mod graph;
pub mod memory;
pub mod model;
pub mod notes;
pub mod pg_repository;
pub mod repository;
pub mod store;

pub use graph::CitationGraph;
pub use memory::MemoryGraphRepository;
pub use model::{ArticleMetadata, ArticlePaths, CanonicalArticle, CitationData, CitationEntry};
pub use notes::{NoteArtifacts, NoteRenderer};
pub use pg_repository::PgGraphRepository;
pub use repository::{ArticleSaveOutcome, GraphRepository, StoredCitation};
pub use store::{
    CitationGraphStore, CitationNetwork, CitationRejection, DocumentRef, ProcessOutcome, SaveStats,
};
