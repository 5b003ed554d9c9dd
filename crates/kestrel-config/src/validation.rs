// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero capacities, thresholds inside `[0, 1]`, and non-empty model names.

use crate::diagnostic::ConfigError;
use crate::model::KestrelConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &KestrelConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !matches!(
        config.engine.log_level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        fail(format!(
            "engine.log_level must be one of trace, debug, info, warn, error; got `{}`",
            config.engine.log_level
        ));
    }

    if config.engine.model_timeout_secs == 0 {
        fail("engine.model_timeout_secs must be greater than 0".to_string());
    }

    if config.ollama.model.trim().is_empty() {
        fail("ollama.model must not be empty".to_string());
    }

    if !config.ollama.base_url.starts_with("http://")
        && !config.ollama.base_url.starts_with("https://")
    {
        fail(format!(
            "ollama.base_url must start with http:// or https://, got `{}`",
            config.ollama.base_url
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    for (name, value) in [
        ("context.capacity", config.context.capacity),
        ("memory.max_memories", config.memory.max_memories),
        ("memory.max_summaries", config.memory.max_summaries),
        ("memory.summarize_threshold", config.memory.summarize_threshold),
        ("reasoning.max_steps", config.reasoning.max_steps),
        ("reasoning.max_plan_steps", config.reasoning.max_plan_steps),
        ("search.dimensions", config.search.dimensions),
        ("search.top_k", config.search.top_k),
    ] {
        if value == 0 {
            fail(format!("{name} must be greater than 0"));
        }
    }

    let reflection = &config.reflection;
    for (name, value) in [
        ("reflection.pass_threshold", reflection.pass_threshold),
        ("reflection.warn_threshold", reflection.warn_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            fail(format!("{name} must be within [0, 1], got {value}"));
        }
    }

    if reflection.warn_threshold > reflection.pass_threshold {
        fail(format!(
            "reflection.warn_threshold ({}) must not exceed reflection.pass_threshold ({})",
            reflection.warn_threshold, reflection.pass_threshold
        ));
    }

    let weights = [
        reflection.quality_weight,
        reflection.accuracy_weight,
        reflection.hallucination_weight,
    ];
    if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
        fail("reflection weights must be non-negative with a positive sum".to_string());
    }

    if !(0.0..=1.0).contains(&config.search.threshold) {
        fail(format!(
            "search.threshold must be within [0, 1], got {}",
            config.search.threshold
        ));
    }

    if config.search.vector_weight < 0.0 || config.search.keyword_weight < 0.0 {
        fail("search weights must be non-negative".to_string());
    }

    if config.search.rrf_k <= 0.0 {
        fail(format!(
            "search.rrf_k must be positive, got {}",
            config.search.rrf_k
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&KestrelConfig::default()).is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = KestrelConfig::default();
        config.context.capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("context.capacity"));
    }

    #[test]
    fn collects_every_violation() {
        let mut config = KestrelConfig::default();
        config.reflection.warn_threshold = 0.9;
        config.reflection.pass_threshold = 0.5;
        config.ollama.model = " ".to_string();
        config.search.threshold = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let mut config = KestrelConfig::default();
        config.engine.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }
}
