//! paperscope-ingestion — Source fan-out, deduplication, and the discovery
//! orchestrator.
//!
//! One discovery run: resolve a question's sources, query them concurrently
//! with per-branch failure isolation, deduplicate the raw records, resolve
//! identities, upsert the citation graph, score against the question, and
//! persist qualifying matches plus run statistics.

pub mod dedup;
pub mod memory;
pub mod models;
pub mod pg_repository;
pub mod pipeline;
pub mod repository;
pub mod sources;

pub use dedup::RecordDeduplicator;
pub use memory::MemoryQuestionRepository;
pub use models::BibliographicRecord;
pub use pg_repository::PgQuestionRepository;
pub use pipeline::{DiscoveryBatchResult, DiscoveryPipeline, DiscoveryRunResult, SourceStats};
pub use repository::{DiscoveryRunRecord, QuestionRepository};
pub use sources::{SourceAdapter, SourceRegistry};
