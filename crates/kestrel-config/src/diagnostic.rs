// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors are turned into [`ConfigError`] values that miette can
//! render with a pointer into `kestrel.toml` and, for misspelled keys, the
//! closest valid key of the same section.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A problem with the loaded configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no kestrel setting uses, usually a typo.
    #[error("unknown key `{key}` in {}", section_label(section))]
    #[diagnostic(
        code(kestrel::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The key as written in the file or environment.
        key: String,
        /// Dotted table path, empty for the top level.
        section: String,
        /// Closest valid key of the same table, if one is similar enough.
        suggestion: Option<String>,
        /// Comma-separated keys the table accepts.
        valid_keys: String,
        /// Location of the key in `src`. Absent for environment overrides.
        #[label("not a kestrel setting")]
        span: Option<SourceSpan>,
        /// The config file the key was read from.
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into the setting's type.
    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(kestrel::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path of the offending value.
        key: String,
        /// What figment actually read, such as `string "ten"`.
        found: String,
        /// The type the setting requires.
        expected: String,
    },

    /// A required key with no default was never set.
    #[error("missing key `{key}`")]
    #[diagnostic(
        code(kestrel::config::missing_key),
        help("set `{key}` in kestrel.toml or through a KESTREL_* variable")
    )]
    MissingKey {
        /// Dotted path of the missing key.
        key: String,
    },

    /// A value parsed but is out of range or inconsistent with another.
    #[error("{message}")]
    #[diagnostic(
        code(kestrel::config::validation),
        help("fix kestrel.toml, then run `kestrel config check`")
    )]
    Validation {
        /// Which setting is wrong and why.
        message: String,
    },

    /// Any other figment failure, kept as its rendered message.
    #[error("configuration error: {0}")]
    #[diagnostic(code(kestrel::config::other))]
    Other(String),
}

fn section_label(section: &str) -> String {
    if section.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{section}]")
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Converts every error inside `err` into a diagnostic.
///
/// `sources` pairs a display path with file content; spans are only
/// attached for errors that can be traced to one of them.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let section = error
                .path
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(".");
            match &error.kind {
                Kind::UnknownField(key, expected) => {
                    let (span, src) = source_for(&error, sources)
                        .and_then(|(name, content)| {
                            let offset = key_offset(content, &section, key)?;
                            Some((
                                SourceSpan::new(offset.into(), key.len()),
                                NamedSource::new(name, content.clone()),
                            ))
                        })
                        .unzip();
                    ConfigError::UnknownKey {
                        key: key.clone(),
                        suggestion: closest_key(key, expected),
                        valid_keys: expected.join(", "),
                        section,
                        span,
                        src,
                    }
                }
                Kind::MissingField(key) => ConfigError::MissingKey {
                    key: qualified(&section, key),
                },
                Kind::InvalidType(found, expected) => ConfigError::InvalidType {
                    key: section,
                    found: found.to_string(),
                    expected: expected.clone(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn qualified(section: &str, key: &str) -> String {
    if section.is_empty() {
        key.to_string()
    } else {
        format!("{section}.{key}")
    }
}

/// The source file an error came from. Inline strings carry no file
/// metadata, so a single inline source is used for them.
fn source_for<'a>(
    error: &figment::error::Error,
    sources: &'a [(String, String)],
) -> Option<&'a (String, String)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|source| match source {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    match file {
        Some(file) => sources.iter().find(|(name, _)| *name == file),
        None if sources.len() == 1 => sources.first(),
        None => None,
    }
}

/// Byte offset of `key` inside the `[section]` table of `content`.
///
/// Lines are scanned while tracking the current table header, so a key of
/// the same name in another table is never matched. An empty `section`
/// means the top level, before the first header.
pub fn key_offset(content: &str, section: &str, key: &str) -> Option<usize> {
    let mut table = "";
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(header) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.split_once(']'))
            .map(|(name, _)| name.trim())
        {
            table = header;
        } else if table == section
            && let Some(after) = trimmed.strip_prefix(key)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + line.len() - trimmed.len());
        }
        offset += line.len();
    }
    None
}

/// The valid key most similar to `unknown`, if any is close enough.
pub fn closest_key(unknown: &str, valid: &[&str]) -> Option<String> {
    valid
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Writes every error to stderr through miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}
