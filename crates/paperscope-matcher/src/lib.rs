//! paperscope-matcher — Scores (article, research question) pairs via the
//! LLM oracle and persists qualifying matches.
//!
//! First score wins: an existing match is never re-scored, and only a user's
//! sentiment / viewed / bookmarked annotations may change afterwards.

pub mod matcher;
pub mod memory;
pub mod pg_store;
pub mod score;
pub mod store;

pub use matcher::{MatchOutcome, RelevanceMatcher, RelevanceScore};
pub use memory::MemoryMatchStore;
pub use pg_store::PgMatchStore;
pub use score::{parse_score_response, ParsedScore, ScoreParseError};
pub use store::{ArticleMatch, MatchStore};
