#[cfg(feature = "fastembed")]
pub mod minilm;
pub mod ollama;

use crate::config::EmbedBackend;
use crate::error::EmbedError;

pub type Embedding = Vec<f32>;

pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Embedding, EmbedError>;
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Construct the embedder named by the config. Loading happens here, so a
/// missing model surfaces as `EmbedError::ModelLoad` before any input is read.
pub fn open(backend: &EmbedBackend) -> Result<Box<dyn Embedder>, EmbedError> {
    match backend {
        EmbedBackend::Ollama {
            model,
            url,
            timeout_secs,
        } => Ok(Box::new(ollama::OllamaEmbedder::new(
            url,
            model,
            *timeout_secs,
        )?)),
        #[cfg(feature = "fastembed")]
        EmbedBackend::FastEmbed { cache_dir } => Ok(Box::new(
            minilm::FastEmbedder::new(cache_dir.as_deref())?,
        )),
        #[cfg(not(feature = "fastembed"))]
        EmbedBackend::FastEmbed { .. } => Err(EmbedError::ModelLoad {
            model: "all-MiniLM-L6-v2".to_string(),
            reason: "built without the `fastembed` feature".to_string(),
        }),
    }
}

/// Reject input the models would embed into noise.
pub(crate) fn ensure_not_empty(text: &str) -> Result<&str, EmbedError> {
    if text.trim().is_empty() {
        Err(EmbedError::EmptyInput)
    } else {
        Ok(text)
    }
}
