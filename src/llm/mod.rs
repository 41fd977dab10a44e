#[cfg(feature = "llama")]
pub mod llama;
pub mod process;

use crate::config::{LlmBackendConfig, LlmConfig};
use crate::error::LlmError;

/// Generation limits passed alongside every prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub max_tokens: usize,
    pub stop: Vec<String>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            stop: vec![crate::prompt::STOP_SEQUENCE.to_string()],
        }
    }
}

impl From<&LlmConfig> for CompletionRequest {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
        }
    }
}

/// Something that continues a prompt. Implementations return the raw
/// continuation; callers go through [`complete_trimmed`].
pub trait LlmBackend {
    fn complete(&self, prompt: &str, request: &CompletionRequest) -> Result<String, LlmError>;
    fn name(&self) -> &str;
}

/// Run a completion and strip surrounding whitespace from the result.
pub fn complete_trimmed(
    backend: &dyn LlmBackend,
    prompt: &str,
    request: &CompletionRequest,
) -> Result<String, LlmError> {
    let text = backend.complete(prompt, request)?;
    Ok(text.trim().to_string())
}

/// Open the configured backend. For the in-process variant this loads the
/// model, so it is only called once a rewrite has actually been requested.
pub fn open(backend: &LlmBackendConfig) -> Result<Box<dyn LlmBackend>, LlmError> {
    match backend {
        LlmBackendConfig::Process {
            runner,
            model,
            strict_exit,
            timeout_secs,
        } => Ok(Box::new(
            process::ProcessBackend::new(runner, model)
                .strict_exit(*strict_exit)
                .timeout_secs(*timeout_secs),
        )),
        #[cfg(feature = "llama")]
        LlmBackendConfig::Local {
            model_path,
            n_ctx,
            seed,
        } => Ok(Box::new(llama::LocalBackend::load(model_path, *n_ctx, *seed)?)),
        #[cfg(not(feature = "llama"))]
        LlmBackendConfig::Local { model_path, .. } => {
            if !model_path.is_file() {
                return Err(LlmError::ModelFileNotFound(model_path.clone()));
            }
            Err(LlmError::Unsupported(
                "in-process inference needs the `llama` feature; rebuild with --features llama"
                    .to_string(),
            ))
        }
    }
}

/// Cut `text` at the earliest stop sequence, if any.
pub fn truncate_at_stop<'a>(text: &'a str, stop: &[String]) -> (&'a str, bool) {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min();
    match cut {
        Some(idx) => (&text[..idx], true),
        None => (text, false),
    }
}
