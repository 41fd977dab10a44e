//! Error types for each stage of the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while turning text into an embedding.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// The embedding model could not be located or loaded.
    #[error("failed to load embedding model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    /// The model was available but encoding the input failed.
    #[error("failed to encode text: {0}")]
    Encoding(String),

    /// Empty or whitespace-only input.
    #[error("cannot embed empty text")]
    EmptyInput,
}

/// Failures while comparing two embeddings.
#[derive(Error, Debug, PartialEq)]
pub enum SimilarityError {
    #[error("invalid vector: {0}")]
    InvalidVector(String),
}

/// Failures from an LLM backend.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("model file not found: {}", .0.display())]
    ModelFileNotFound(PathBuf),

    #[error("failed to load model {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("prompt is {prompt_tokens} tokens but the context window is {n_ctx}")]
    ContextOverflow { prompt_tokens: usize, n_ctx: u32 },

    #[error("failed to launch `{command}`: {source}")]
    ProcessLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    ProcessFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` did not finish within {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("{0}")]
    Unsupported(String),

    #[error("I/O error talking to the model runner: {0}")]
    Io(#[from] std::io::Error),
}
