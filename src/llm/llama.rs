use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use tracing::{debug, info};

use super::{CompletionRequest, LlmBackend, truncate_at_stop};
use crate::error::LlmError;

/// Quantized GGUF model run in-process through llama.cpp.
pub struct LocalBackend {
    backend: LlamaBackend,
    model: LlamaModel,
    path: PathBuf,
    label: String,
    n_ctx: u32,
    seed: u32,
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("path", &self.path)
            .field("n_ctx", &self.n_ctx)
            .finish()
    }
}

impl LocalBackend {
    pub fn load(path: &Path, n_ctx: u32, seed: u32) -> Result<Self, LlmError> {
        if !path.is_file() {
            return Err(LlmError::ModelFileNotFound(path.to_path_buf()));
        }

        let load_err = |reason: String| LlmError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };
        let backend = LlamaBackend::init().map_err(|e| load_err(e.to_string()))?;
        let model = LlamaModel::load_from_file(&backend, path, &LlamaModelParams::default())
            .map_err(|e| load_err(e.to_string()))?;
        info!(path = %path.display(), n_ctx, "loaded GGUF model");

        Ok(Self {
            backend,
            model,
            path: path.to_path_buf(),
            label: path.display().to_string(),
            n_ctx,
            seed,
        })
    }
}

impl LlmBackend for LocalBackend {
    fn complete(&self, prompt: &str, request: &CompletionRequest) -> Result<String, LlmError> {
        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| LlmError::Inference(format!("tokenizing prompt: {e}")))?;

        let n_ctx = self.n_ctx as usize;
        if tokens.is_empty() {
            return Err(LlmError::Inference("prompt produced no tokens".to_string()));
        }
        if tokens.len() >= n_ctx {
            return Err(LlmError::ContextOverflow {
                prompt_tokens: tokens.len(),
                n_ctx: self.n_ctx,
            });
        }
        let budget = request.max_tokens.min(n_ctx - tokens.len());
        debug!(prompt_tokens = tokens.len(), budget, "starting generation");

        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_batch(self.n_ctx);
        let mut ctx = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| LlmError::Inference(format!("creating context: {e}")))?;

        let mut batch = LlamaBatch::new(n_ctx, 1);
        let last = tokens.len() - 1;
        for (i, token) in tokens.iter().enumerate() {
            batch
                .add(*token, i as i32, &[0], i == last)
                .map_err(|e| LlmError::Inference(e.to_string()))?;
        }
        ctx.decode(&mut batch)
            .map_err(|e| LlmError::Inference(format!("decoding prompt: {e}")))?;

        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::top_k(40),
            LlamaSampler::top_p(0.95, 1),
            LlamaSampler::temp(0.8),
            LlamaSampler::dist(self.seed),
        ]);

        // Tokens can split UTF-8 sequences, so collect bytes and decode once.
        let mut output = Vec::new();
        let mut n_cur = tokens.len();
        for _ in 0..budget {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            if self.model.is_eog_token(token) {
                break;
            }
            let piece = self
                .model
                .token_to_bytes(token, Special::Tokenize)
                .map_err(|e| LlmError::Inference(e.to_string()))?;
            output.extend_from_slice(&piece);

            if truncate_at_stop(&String::from_utf8_lossy(&output), &request.stop).1 {
                break;
            }

            batch.clear();
            batch
                .add(token, n_cur as i32, &[0], true)
                .map_err(|e| LlmError::Inference(e.to_string()))?;
            n_cur += 1;
            ctx.decode(&mut batch)
                .map_err(|e| LlmError::Inference(format!("decoding token: {e}")))?;
        }

        let text = String::from_utf8_lossy(&output);
        let (kept, stopped) = truncate_at_stop(&text, &request.stop);
        debug!(generated = n_cur - tokens.len(), stopped, "generation finished");
        Ok(kept.to_string())
    }

    fn name(&self) -> &str {
        &self.label
    }
}
