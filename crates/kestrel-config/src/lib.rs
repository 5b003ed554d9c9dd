// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kestrel configuration.
//!
//! `kestrel.toml` files are layered over compiled defaults and
//! `KESTREL_*` variables are applied last. Unknown keys are rejected with a
//! "did you mean" hint, and semantic checks report every violation at once.
//!
//! ```no_run
//! let config = kestrel_config::load_and_validate()
//!     .unwrap_or_else(|errors| panic!("{} config errors", errors.len()));
//! println!("answering with {}", config.ollama.model);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::KestrelConfig;

/// Loads the layered configuration and validates it.
pub fn load_and_validate() -> Result<KestrelConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || {
        loader::config_files()
            .iter()
            .filter_map(|path| read_source(path))
            .collect()
    })
}

/// Loads `path` plus env overrides and validates the result.
pub fn load_and_validate_path(path: &Path) -> Result<KestrelConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Validates a TOML string layered over the defaults.
pub fn load_and_validate_str(toml_content: &str) -> Result<KestrelConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Runs semantic validation on a parsed config, or turns a parse failure
/// into diagnostics. Sources are only read on failure.
fn checked(
    parsed: Result<KestrelConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<KestrelConfig, Vec<ConfigError>> {
    match parsed {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

fn read_source(path: &Path) -> Option<(String, String)> {
    let content = std::fs::read_to_string(path).ok()?;
    let name = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    Some((name.display().to_string(), content))
}
