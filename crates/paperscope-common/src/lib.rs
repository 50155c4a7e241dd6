//! paperscope-common — Shared types, errors, and identity resolution used
//! across all PaperScope crates.

pub mod config;
pub mod error;
pub mod identity;
pub mod question;

pub use config::{AppConfig, DatabaseConfig, DiscoveryConfig, LlmConfig};
pub use error::{PaperscopeError, Result};
pub use identity::{resolve_identity, IdentitySignals};
pub use question::ResearchQuestion;
