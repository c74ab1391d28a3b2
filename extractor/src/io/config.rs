//! Extractor configuration stored in `extractor.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::tokens::TokenizerKind;
use crate::extract::ExtractionConfig;
use crate::io::oracle::{
    ChatCompletionOracle, ChatCompletionSettings, CommandOracle, CommandSettings, Oracle,
};
use crate::io::prompt::{DEFAULT_SYSTEM_PROMPT, PromptEngine};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "extractor.toml";

/// Extractor configuration (TOML).
///
/// Missing fields take the defaults below; the engine itself only ever sees
/// explicit values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Directory holding `*.json` transcripts.
    pub input_dir: PathBuf,

    /// Directory receiving `<stem>_processed.json` records.
    pub output_dir: PathBuf,

    /// Token budget per window.
    pub window_length: usize,

    /// Oracle calls allowed per window.
    pub max_iterations_per_window: u32,

    /// Token estimation heuristic.
    pub tokenizer: TokenizerKind,

    /// System message sent with every prompt.
    pub system_prompt: String,

    /// Replace the built-in extraction template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<PathBuf>,

    pub oracle: OracleConfig,
}

/// Which oracle client to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleBackend {
    #[default]
    Http,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    pub backend: OracleBackend,

    /// Base URL of an OpenAI-compatible API (e.g. `https://api.openai.com/v1`).
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Model identifier, also echoed into every output record.
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Program and arguments for the `command` backend.
    pub command: Vec<String>,

    /// Truncate command stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: OracleBackend::Http,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "ORACLE_API_KEY".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.0,
            max_tokens: 8192,
            timeout_secs: 1000,
            command: Vec::new(),
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input_asr_files"),
            output_dir: PathBuf::from("output_qa_results"),
            window_length: 1024,
            max_iterations_per_window: 15,
            tokenizer: TokenizerKind::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prompt_template: None,
            oracle: OracleConfig::default(),
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_length == 0 {
            return Err(anyhow!("window_length must be > 0"));
        }
        if self.max_iterations_per_window == 0 {
            return Err(anyhow!("max_iterations_per_window must be > 0"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        if self.oracle.model.trim().is_empty() {
            return Err(anyhow!("oracle.model must not be empty"));
        }
        match self.oracle.backend {
            OracleBackend::Http => {
                if self.oracle.base_url.trim().is_empty() {
                    return Err(anyhow!("oracle.base_url must not be empty"));
                }
            }
            OracleBackend::Command => {
                if self.oracle.command.is_empty() || self.oracle.command[0].trim().is_empty() {
                    return Err(anyhow!("oracle.command must be a non-empty array"));
                }
                if self.oracle.output_limit_bytes == 0 {
                    return Err(anyhow!("oracle.output_limit_bytes must be > 0"));
                }
            }
        }
        Ok(())
    }

    /// Engine parameters, echoed into every output record.
    pub fn extraction(&self) -> ExtractionConfig {
        ExtractionConfig {
            window_length: self.window_length,
            max_iterations_per_window: self.max_iterations_per_window,
            model_name: self.oracle.model.clone(),
        }
    }

    pub fn prompt_engine(&self) -> Result<PromptEngine> {
        match &self.prompt_template {
            Some(path) => PromptEngine::from_template_file(path, self.system_prompt.clone()),
            None => PromptEngine::new(self.system_prompt.clone()),
        }
    }

    /// Build the configured oracle client.
    ///
    /// The API key is read from `oracle.api_key_env`; a missing variable sends
    /// requests without authorization (useful for local servers).
    pub fn build_oracle(&self) -> Result<Box<dyn Oracle>> {
        let timeout = Duration::from_secs(self.oracle.timeout_secs);
        match self.oracle.backend {
            OracleBackend::Http => {
                let api_key = std::env::var(&self.oracle.api_key_env)
                    .ok()
                    .filter(|key| !key.trim().is_empty());
                let oracle = ChatCompletionOracle::new(ChatCompletionSettings {
                    base_url: self.oracle.base_url.clone(),
                    api_key,
                    model: self.oracle.model.clone(),
                    temperature: self.oracle.temperature,
                    max_tokens: self.oracle.max_tokens,
                    timeout,
                })
                .context("build http oracle client")?;
                Ok(Box::new(oracle))
            }
            OracleBackend::Command => Ok(Box::new(CommandOracle::new(CommandSettings {
                command: self.oracle.command.clone(),
                timeout,
                output_limit_bytes: self.oracle.output_limit_bytes,
            }))),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ExtractorConfig::default()`.
pub fn load_config(path: &Path) -> Result<ExtractorConfig> {
    if !path.exists() {
        let cfg = ExtractorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ExtractorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ExtractorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ExtractorConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("extractor.toml");
        let cfg = ExtractorConfig {
            window_length: 1536,
            max_iterations_per_window: 10,
            tokenizer: TokenizerKind::Chars,
            prompt_template: Some(PathBuf::from("prompts/custom.md")),
            ..ExtractorConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("extractor.toml");
        fs::write(
            &path,
            "window_length = 2048\n[oracle]\nmodel = \"deepseek-chat\"\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.window_length, 2048);
        assert_eq!(cfg.max_iterations_per_window, 15);
        assert_eq!(cfg.oracle.model, "deepseek-chat");
        assert_eq!(cfg.oracle.timeout_secs, 1000);
        assert_eq!(cfg.extraction().model_name, "deepseek-chat");
    }

    #[test]
    fn zero_window_length_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("extractor.toml");
        fs::write(&path, "window_length = 0\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("window_length must be > 0"));
    }

    #[test]
    fn command_backend_requires_command() {
        let mut cfg = ExtractorConfig::default();
        cfg.oracle.backend = OracleBackend::Command;
        assert!(cfg.validate().is_err());

        cfg.oracle.command = vec!["llm".to_string(), "-m".to_string(), "local".to_string()];
        assert!(cfg.validate().is_ok());
        assert!(cfg.build_oracle().is_ok());
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let cfg = ExtractorConfig {
            max_iterations_per_window: 0,
            ..ExtractorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
