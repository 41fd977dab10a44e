//! Match a free-text query against a PTP configuration document by embedding
//! similarity, and rewrite the document with an LLM on request.

pub mod config;
pub mod console;
pub mod embed;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod similarity;

pub use config::Config;
pub use error::{EmbedError, LlmError, SimilarityError};
pub use pipeline::{Document, Matcher, Outcome};
