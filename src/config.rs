use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "ptp-assist.toml";

/// Document matched against when neither the config nor `--document` name one.
pub const DEFAULT_DOCUMENT: &str = "PtpConfigBoundary.yaml";

/// GGUF model loaded by the in-process backend.
pub const DEFAULT_GGUF_PATH: &str = "./models/mistral-7b-instruct.Q4_K_M.gguf";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the configuration document to match against
    pub document: PathBuf,
    pub embed: EmbedConfig,
    pub llm: LlmConfig,
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub backend: EmbedBackend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EmbedBackend {
    #[serde(rename = "ollama")]
    Ollama {
        model: String,
        url: String,
        #[serde(default = "default_http_timeout")]
        timeout_secs: u64,
    },
    #[serde(rename = "fastembed")]
    FastEmbed {
        /// Where ONNX weights are cached (library default when unset)
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Upper bound on generated tokens
    pub max_tokens: usize,
    /// Markers that end generation
    pub stop: Vec<String>,
    pub backend: LlmBackendConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LlmBackendConfig {
    /// Quantized GGUF model run in-process through llama.cpp.
    #[serde(rename = "local")]
    Local {
        model_path: PathBuf,
        #[serde(default = "default_n_ctx")]
        n_ctx: u32,
        #[serde(default = "default_seed")]
        seed: u32,
    },
    /// External runner invoked as `<runner> run <model>` with the prompt on stdin.
    #[serde(rename = "process")]
    Process {
        runner: String,
        model: String,
        /// Treat a non-zero exit status as a failure
        #[serde(default = "default_strict_exit")]
        strict_exit: bool,
        /// Kill the runner after this many seconds (no limit when unset)
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Example shown in the query prompt
    pub query_hint: String,
    /// Characters of the document echoed on a match
    pub preview_chars: usize,
}

fn default_http_timeout() -> u64 {
    60
}

fn default_n_ctx() -> u32 {
    2048
}

fn default_seed() -> u32 {
    1234
}

fn default_strict_exit() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document: PathBuf::from(DEFAULT_DOCUMENT),
            embed: EmbedConfig::default(),
            llm: LlmConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            backend: EmbedBackend::Ollama {
                model: "all-minilm".to_string(),
                url: "http://localhost:11434".to_string(),
                timeout_secs: default_http_timeout(),
            },
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            stop: vec!["###".to_string()],
            backend: LlmBackendConfig::process_default(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            query_hint: "ptp config for boundary nic".to_string(),
            preview_chars: 1000,
        }
    }
}

/// Which LLM backend to use, as picked on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// In-process GGUF model
    Local,
    /// External model runner
    Process,
}

impl LlmBackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Local { .. } => BackendKind::Local,
            Self::Process { .. } => BackendKind::Process,
        }
    }

    pub fn local_default() -> Self {
        Self::Local {
            model_path: PathBuf::from(DEFAULT_GGUF_PATH),
            n_ctx: default_n_ctx(),
            seed: default_seed(),
        }
    }

    pub fn process_default() -> Self {
        Self::Process {
            runner: "ollama".to_string(),
            model: "mistral".to_string(),
            strict_exit: default_strict_exit(),
            timeout_secs: None,
        }
    }

    /// Short label used in console messages.
    pub fn label(&self) -> String {
        match self {
            Self::Local { .. } => "local LLM".to_string(),
            Self::Process { runner, .. } => format!("local LLM ({})", display_name(runner)),
        }
    }
}

/// `/usr/local/bin/ollama` -> `Ollama`.
fn display_name(runner: &str) -> String {
    let name = Path::new(runner)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(runner);
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Config {
    /// Load config from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("parsing config from {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply command-line overrides. Switching backend kind starts from that
    /// backend's defaults; asking for the kind already configured keeps its settings.
    pub fn override_with(&mut self, document: Option<PathBuf>, backend: Option<BackendKind>) {
        if let Some(document) = document {
            self.document = document;
        }
        match backend {
            Some(kind) if kind != self.llm.backend.kind() => {
                self.llm.backend = match kind {
                    BackendKind::Local => LlmBackendConfig::local_default(),
                    BackendKind::Process => LlmBackendConfig::process_default(),
                };
            }
            _ => {}
        }
    }

    /// Write current config to disk (for `ptp-assist init`).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating config dir {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("writing config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.llm.stop, vec!["###".to_string()]);
        assert_eq!(config.console.preview_chars, 1000);
    }

    #[test]
    fn save_then_load_preserves_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ptp-assist.toml");
        let mut config = Config::default();
        config.llm.backend = LlmBackendConfig::local_default();
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ptp-assist.toml");
        std::fs::write(
            &path,
            r#"
document = "DualNic.yaml"

[llm.backend]
type = "local"
model_path = "/models/m.gguf"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.document, PathBuf::from("DualNic.yaml"));
        assert_eq!(
            config.llm.backend,
            LlmBackendConfig::Local {
                model_path: PathBuf::from("/models/m.gguf"),
                n_ctx: 2048,
                seed: 1234,
            }
        );
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.embed, EmbedConfig::default());
    }

    #[test]
    fn process_backend_defaults_to_strict_exit() {
        let parsed: LlmBackendConfig =
            toml::from_str("type = \"process\"\nrunner = \"ollama\"\nmodel = \"mistral\"\n")
                .unwrap();
        assert_eq!(parsed, LlmBackendConfig::process_default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[llm.backend]\ntype = \"carrier-pigeon\"\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }

    #[test]
    fn overrides_switch_backend_and_document() {
        let mut config = Config::default();
        config.override_with(Some(PathBuf::from("Dual.yaml")), Some(BackendKind::Local));
        assert_eq!(config.document, PathBuf::from("Dual.yaml"));
        assert_eq!(config.llm.backend, LlmBackendConfig::local_default());
    }

    #[test]
    fn override_with_same_kind_keeps_settings() {
        let mut config = Config::default();
        config.llm.backend = LlmBackendConfig::Process {
            runner: "/opt/bin/ollama".to_string(),
            model: "llama3".to_string(),
            strict_exit: false,
            timeout_secs: Some(30),
        };
        let before = config.clone();
        config.override_with(None, Some(BackendKind::Process));
        assert_eq!(config, before);
    }

    #[test]
    fn backend_labels() {
        assert_eq!(LlmBackendConfig::process_default().label(), "local LLM (Ollama)");
        let custom = LlmBackendConfig::Process {
            runner: "/usr/local/bin/ollama".to_string(),
            model: "mistral".to_string(),
            strict_exit: true,
            timeout_secs: None,
        };
        assert_eq!(custom.label(), "local LLM (Ollama)");
        assert_eq!(LlmBackendConfig::local_default().label(), "local LLM");
    }
}
