use std::path::Path;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use super::{Embedder, Embedding, ensure_not_empty};
use crate::error::EmbedError;

const MODEL_NAME: &str = "all-MiniLM-L6-v2";
const DIMENSIONS: usize = 384;

/// In-process all-MiniLM-L6-v2 through the ONNX runtime.
///
/// `TextEmbedding::embed` wants exclusive access, so the model sits behind a
/// `Mutex` and `embed` can keep taking `&self`.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedder {
    pub fn new(cache_dir: Option<&Path>) -> Result<Self, EmbedError> {
        let mut options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir.to_path_buf());
        }

        let model = TextEmbedding::try_new(options).map_err(|e| EmbedError::ModelLoad {
            model: MODEL_NAME.to_string(),
            reason: e.to_string(),
        })?;
        info!(model = MODEL_NAME, "fastembed model loaded");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        let text = ensure_not_empty(text)?;
        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbedError::Encoding("embedding model lock poisoned".to_string()))?;
        let mut embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbedError::Encoding(e.to_string()))?;
        embeddings
            .pop()
            .ok_or_else(|| EmbedError::Encoding("model returned no embedding".to_string()))
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}
