use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{Embedder, Embedding, ensure_not_empty};
use crate::error::EmbedError;

/// Embeds text through a local Ollama server's `/api/embed` endpoint.
pub struct OllamaEmbedder {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, EmbedError> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(timeout_secs)))
            .build()
            .into();

        let mut embedder = Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions: 0,
        };

        // Probe dimensions with a short test string
        let test = embedder.embed("test").map_err(|e| EmbedError::ModelLoad {
            model: model.to_string(),
            reason: e.to_string(),
        })?;
        embedder.dimensions = test.len();
        debug!(model, dimensions = embedder.dimensions, "ollama embedder ready");
        Ok(embedder)
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        let text = ensure_not_empty(text)?;

        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "truncate": true,
        });

        let mut response = match self.agent.post(&url).send_json(&body) {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(EmbedError::Encoding(format!("ollama returned HTTP {code}")));
            }
            Err(e) => {
                return Err(EmbedError::Encoding(format!(
                    "ollama embedding request failed: {e}"
                )));
            }
        };

        let resp: EmbedResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| EmbedError::Encoding(format!("parsing ollama response: {e}")))?;

        first_embedding(resp, self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Pull the single vector out of a response, checking it against the probed size.
fn first_embedding(resp: EmbedResponse, expected_dims: usize) -> Result<Embedding, EmbedError> {
    let embedding = resp
        .embeddings
        .into_iter()
        .next()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| EmbedError::Encoding("no embedding in ollama response".to_string()))?;

    if expected_dims != 0 && embedding.len() != expected_dims {
        return Err(EmbedError::Encoding(format!(
            "expected {expected_dims} dimensions, got {}",
            embedding.len()
        )));
    }
    Ok(embedding)
}
