// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./kestrel.toml` > `~/.config/kestrel/kestrel.toml` > `/etc/kestrel/kestrel.toml`
//! with environment variable overrides via `KESTREL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::KestrelConfig;

/// Top-level sections, used to map `KESTREL_SECTION_KEY` to `section.key`.
const SECTIONS: &[&str] = &[
    "engine",
    "router",
    "ollama",
    "storage",
    "context",
    "memory",
    "reasoning",
    "reflection",
    "search",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/kestrel/kestrel.toml` (system-wide)
/// 3. `~/.config/kestrel/kestrel.toml` (user XDG config)
/// 4. `./kestrel.toml` (local directory)
/// 5. `KESTREL_*` environment variables
pub fn load_config() -> Result<KestrelConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config file specification.
pub fn load_config_from_str(toml_content: &str) -> Result<KestrelConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KestrelConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KestrelConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KestrelConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order: system, user, then the working directory.
pub fn config_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from("/etc/kestrel/kestrel.toml")];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("kestrel").join("kestrel.toml"));
    }
    files.push(PathBuf::from("kestrel.toml"));
    files
}

/// Defaults, every file of [`config_files`], then `KESTREL_*` variables.
pub fn build_figment() -> Figment {
    config_files()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(KestrelConfig::default())),
            |figment, file| figment.merge(Toml::file(file)),
        )
        .merge(env_provider())
}

/// Environment provider mapping only the leading section name to a dot.
///
/// `KESTREL_OLLAMA_BASE_URL` becomes `ollama.base_url`, keeping underscores
/// inside key names intact.
fn env_provider() -> Env {
    Env::prefixed("KESTREL_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a prefix-stripped variable name to a dotted config key.
///
/// Figment hands over the name as written in the environment, usually
/// upper case, so it is lowercased before the section split.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_leading_section_only() {
        assert_eq!(map_env_key("ollama_base_url"), "ollama.base_url");
        assert_eq!(map_env_key("memory_max_memories"), "memory.max_memories");
        assert_eq!(
            map_env_key("reflection_pass_threshold"),
            "reflection.pass_threshold"
        );
        assert_eq!(map_env_key("unknown_key"), "unknown_key");
    }

    #[test]
    fn upper_case_env_keys_are_lowercased() {
        assert_eq!(map_env_key("OLLAMA_MODEL"), "ollama.model");
        assert_eq!(map_env_key("SEARCH_TOP_K"), "search.top_k");
        assert_eq!(map_env_key("Engine_Log_Level"), "engine.log_level");
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("kestrel.toml", "[ollama]\nmodel = \"from-file\"\n")?;
            jail.set_env("KESTREL_OLLAMA_MODEL", "from-env");
            jail.set_env("KESTREL_REASONING_MAX_STEPS", "3");
            let config = load_config_from_path(Path::new("kestrel.toml"))?;
            assert_eq!(config.ollama.model, "from-env");
            assert_eq!(config.reasoning.max_steps, 3);
            Ok(())
        });
    }
}
