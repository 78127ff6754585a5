use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::moderator::DEFAULT_SAFE_LABELS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Location of the SQLite index snapshot.
    pub path: PathBuf,
    /// Stories whose embedding text is shorter than this are excluded at
    /// build time and never embedded or returned.
    #[serde(default = "default_min_story_chars")]
    pub min_story_chars: usize,
}

fn default_min_story_chars() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    /// Upper bound accepted for a caller-supplied top_k.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    /// Query texts longer than this are rejected before any computation.
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            max_top_k: default_max_top_k(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_similarity() -> f32 {
    0.2
}
fn default_max_top_k() -> usize {
    20
}
fn default_max_query_chars() -> usize {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RiskConfig {
    /// Location of the trained risk-model snapshot (JSON).
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Queries scoring above this are flagged as a crisis (never blocked).
    #[serde(default = "default_crisis_threshold")]
    pub crisis_threshold: f32,
    /// Labels binarized to "safe" during training; all others are risky.
    #[serde(default = "default_safe_labels")]
    pub safe_labels: Vec<String>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            crisis_threshold: default_crisis_threshold(),
            safe_labels: default_safe_labels(),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("./models/risk.json")
}
fn default_crisis_threshold() -> f32 {
    0.8
}
fn default_safe_labels() -> Vec<String> {
    DEFAULT_SAFE_LABELS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// OpenAI-compatible chat-completions endpoint.
    #[serde(default = "default_chat_url")]
    pub url: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_reply_tokens")]
    pub max_reply_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
    /// User turns required before suggestions are attached.
    #[serde(default = "default_intake_turns")]
    pub intake_turns: usize,
    #[serde(default = "default_suggestion_top_k")]
    pub suggestion_top_k: usize,
    /// Looser than the one-shot threshold: conversational text is noisier
    /// and a narrow threshold would starve results.
    #[serde(default = "default_suggestion_min_similarity")]
    pub suggestion_min_similarity: f32,
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: default_chat_url(),
            model: None,
            api_key_env: default_api_key_env(),
            max_reply_tokens: default_max_reply_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_chat_timeout_secs(),
            intake_turns: default_intake_turns(),
            suggestion_top_k: default_suggestion_top_k(),
            suggestion_min_similarity: default_suggestion_min_similarity(),
            max_message_chars: default_max_message_chars(),
        }
    }
}

fn default_chat_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}
fn default_max_reply_tokens() -> u32 {
    300
}
fn default_temperature() -> f32 {
    0.7
}
fn default_chat_timeout_secs() -> u64 {
    30
}
fn default_intake_turns() -> usize {
    2
}
fn default_suggestion_top_k() -> usize {
    3
}
fn default_suggestion_min_similarity() -> f32 {
    0.3
}
fn default_max_message_chars() -> usize {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate index
    if config.index.min_story_chars == 0 {
        anyhow::bail!("index.min_story_chars must be > 0");
    }

    // Validate matching
    if config.matching.max_top_k < 1 {
        anyhow::bail!("matching.max_top_k must be >= 1");
    }
    if config.matching.top_k < 1 || config.matching.top_k > config.matching.max_top_k {
        anyhow::bail!(
            "matching.top_k must be between 1 and {}",
            config.matching.max_top_k
        );
    }
    if !(0.0..=1.0).contains(&config.matching.min_similarity) {
        anyhow::bail!("matching.min_similarity must be in [0.0, 1.0]");
    }

    // Validate risk
    if !(0.0..=1.0).contains(&config.risk.crisis_threshold) {
        anyhow::bail!("risk.crisis_threshold must be in [0.0, 1.0]");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    // Validate chat
    if config.chat.intake_turns < 1 {
        anyhow::bail!("chat.intake_turns must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.chat.suggestion_min_similarity) {
        anyhow::bail!("chat.suggestion_min_similarity must be in [0.0, 1.0]");
    }
    if config.chat.suggestion_top_k < 1 || config.chat.suggestion_top_k > config.matching.max_top_k
    {
        anyhow::bail!(
            "chat.suggestion_top_k must be between 1 and {}",
            config.matching.max_top_k
        );
    }

    Ok(config)
}
