// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Kestrel reasoning engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Kestrel configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KestrelConfig {
    /// Engine-wide behavior settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Intent classifier settings.
    #[serde(default)]
    pub router: RouterConfig,

    /// Ollama backend settings.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Record store and document corpus settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Short-term context memory settings.
    #[serde(default)]
    pub context: ContextConfig,

    /// Long-term memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Reasoning engine limits.
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Self-reflection grading settings.
    #[serde(default)]
    pub reflection: ReflectionConfig,

    /// Semantic search index settings.
    #[serde(default)]
    pub search: SearchConfig,
}

/// Which reasoning engine handles queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSetting {
    /// Let the mode selector decide per query.
    #[default]
    Auto,
    Direct,
    Chain,
    ToolLoop,
    MultiAgent,
}

/// Engine-wide behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Forced reasoning mode, or `auto`.
    #[serde(default)]
    pub mode: ModeSetting,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on any single model call before its stage degrades.
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ModeSetting::default(),
            log_level: default_log_level(),
            model_timeout_secs: default_model_timeout_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model_timeout_secs() -> u64 {
    30
}

/// Intent classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Device identifiers recognized during entity extraction.
    #[serde(default = "default_known_devices")]
    pub known_devices: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            known_devices: default_known_devices(),
        }
    }
}

fn default_known_devices() -> Vec<String> {
    vec![
        "Basler_GigE".to_string(),
        "Watashi_cam".to_string(),
        "Camera_03".to_string(),
    ]
}

/// Ollama backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for text completion.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for embeddings when `search.embedder = "ollama"`.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// HTTP request timeout.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries on transient HTTP status codes.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_http_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_http_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    1
}

/// Record store and document corpus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite inspections database.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory holding `.txt` and `.md` manuals.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            documents_dir: default_documents_dir(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("kestrel").join(name))
        .unwrap_or_else(|| std::path::PathBuf::from(name))
        .display()
        .to_string()
}

fn default_database_path() -> String {
    data_file("inspections.db")
}

fn default_documents_dir() -> String {
    "manuals".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Short-term context memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Maximum exchanges retained in the conversation buffer.
    #[serde(default = "default_context_capacity")]
    pub capacity: usize,

    /// Maximum characters of rendered context placed in a prompt.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            capacity: default_context_capacity(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

fn default_context_capacity() -> usize {
    10
}

fn default_max_prompt_chars() -> usize {
    4000
}

/// Long-term memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Cap applied independently to insights and patterns.
    #[serde(default = "default_max_memories")]
    pub max_memories: usize,

    /// Cap on stored period summaries.
    #[serde(default = "default_max_summaries")]
    pub max_summaries: usize,

    /// Exchanges since the last summarization that trigger a new one.
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,

    /// Insights and patterns returned per relevance lookup.
    #[serde(default = "default_relevant_top_k")]
    pub relevant_top_k: usize,

    /// Snapshot file loaded at startup and saved after each answer by the CLI.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memories: default_max_memories(),
            max_summaries: default_max_summaries(),
            summarize_threshold: default_summarize_threshold(),
            relevant_top_k: default_relevant_top_k(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

fn default_max_memories() -> usize {
    100
}

fn default_max_summaries() -> usize {
    50
}

fn default_summarize_threshold() -> usize {
    20
}

fn default_relevant_top_k() -> usize {
    5
}

fn default_snapshot_path() -> String {
    data_file("memories.json")
}

/// Reasoning engine limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReasoningConfig {
    /// Tool-use loop cycle limit.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Longest plan the multi-agent planner may produce.
    #[serde(default = "default_max_plan_steps")]
    pub max_plan_steps: usize,

    /// Tool output characters kept per observation.
    #[serde(default = "default_observation_chars")]
    pub observation_chars: usize,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_plan_steps: default_max_plan_steps(),
            observation_chars: default_observation_chars(),
        }
    }
}

fn default_max_steps() -> usize {
    5
}

fn default_max_plan_steps() -> usize {
    5
}

fn default_observation_chars() -> usize {
    500
}

/// Self-reflection grading configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReflectionConfig {
    /// Overall score at or above which a draft passes untouched.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    /// Overall score below which one correction is attempted.
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: f64,

    #[serde(default = "default_weight")]
    pub quality_weight: f64,

    #[serde(default = "default_weight")]
    pub accuracy_weight: f64,

    #[serde(default = "default_weight")]
    pub hallucination_weight: f64,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            warn_threshold: default_warn_threshold(),
            quality_weight: default_weight(),
            accuracy_weight: default_weight(),
            hallucination_weight: default_weight(),
        }
    }
}

fn default_pass_threshold() -> f64 {
    0.8
}

fn default_warn_threshold() -> f64 {
    0.7
}

fn default_weight() -> f64 {
    1.0 / 3.0
}

/// Embedding backend used by the semantic index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderSetting {
    /// Deterministic local feature hashing.
    #[default]
    Hashing,
    /// Ollama embedding endpoint.
    Ollama,
}

/// Semantic search index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default)]
    pub embedder: EmbedderSetting,

    /// Vector size for the hashing embedder.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_search_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for plain vector search.
    #[serde(default = "default_search_threshold")]
    pub threshold: f32,

    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Reciprocal-rank fusion constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            embedder: EmbedderSetting::default(),
            dimensions: default_dimensions(),
            top_k: default_search_top_k(),
            threshold: default_search_threshold(),
            vector_weight: default_vector_weight(),
            keyword_weight: default_keyword_weight(),
            rrf_k: default_rrf_k(),
        }
    }
}

fn default_dimensions() -> usize {
    256
}

fn default_search_top_k() -> usize {
    10
}

fn default_search_threshold() -> f32 {
    0.3
}

fn default_vector_weight() -> f32 {
    0.7
}

fn default_keyword_weight() -> f32 {
    0.3
}

fn default_rrf_k() -> f32 {
    60.0
}
