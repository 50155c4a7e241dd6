//! paperscope-llm — The LLM oracle interface and its concrete backends.
//!
//! The rest of the workspace only sees [`oracle::LlmOracle`]: one prompt in,
//! one text completion out. Everything provider-specific (endpoints, request
//! bodies, auth headers) stays in [`backends`].

pub mod backends;
pub mod oracle;

pub use backends::{oracle_from_config, AnthropicOracle, OllamaOracle, OpenAiCompatibleOracle};
pub use oracle::{LlmError, LlmOracle, MockOracle};
