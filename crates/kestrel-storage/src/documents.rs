// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword search over a directory of `.txt` and `.md` manuals.
//!
//! Each document is split into lowercase words; words of more than three
//! characters go into a word-to-document index. A query ranks documents by
//! how many distinct query words they contain.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use async_trait::async_trait;
use kestrel_core::text::tokenize;
use kestrel_core::{
    AdapterType, DocumentHit, DocumentSearch, HealthStatus, KestrelError, PluginAdapter,
};
use tracing::{debug, info, warn};

/// Hits returned per query.
const TOP_HITS: usize = 3;

/// Approximate excerpt length in characters.
const EXCERPT_CHARS: usize = 500;

struct Document {
    source: String,
    content: String,
}

/// In-memory keyword index over loaded documents.
pub struct KeywordDocumentIndex {
    documents: Vec<Document>,
    index: HashMap<String, BTreeSet<usize>>,
}

fn indexable_words(text: &str) -> impl Iterator<Item = String> + '_ {
    tokenize(text)
        .into_iter()
        .filter(|w| w.chars().count() > 3)
}

impl KeywordDocumentIndex {
    /// Builds an index from `(source, content)` pairs.
    pub fn from_documents(documents: Vec<(String, String)>) -> Self {
        let documents: Vec<Document> = documents
            .into_iter()
            .map(|(source, content)| Document { source, content })
            .collect();
        let mut index: HashMap<String, BTreeSet<usize>> = HashMap::new();
        for (i, doc) in documents.iter().enumerate() {
            for word in indexable_words(&doc.content) {
                index.entry(word).or_default().insert(i);
            }
        }
        Self { documents, index }
    }

    /// Loads every `.txt` and `.md` file directly inside `dir`.
    ///
    /// A missing directory yields an empty index. Unreadable files are
    /// skipped with a warning.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self, KestrelError> {
        let dir = dir.as_ref();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "documents directory not found, search disabled");
                return Ok(Self::from_documents(Vec::new()));
            }
            Err(e) => {
                return Err(KestrelError::Storage {
                    source: Box::new(e),
                });
            }
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| KestrelError::Storage {
                source: Box::new(e),
            })?
        {
            let path = entry.path();
            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"));
            if !is_text {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    let source = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    debug!(source = %source, chars = content.len(), "document loaded");
                    documents.push((source, content));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
            }
        }
        documents.sort_by(|a, b| a.0.cmp(&b.0));

        info!(dir = %dir.display(), documents = documents.len(), "document corpus loaded");
        Ok(Self::from_documents(documents))
    }

    /// Number of distinct indexed words.
    pub fn vocabulary_size(&self) -> usize {
        self.index.len()
    }

    fn excerpt(content: &str, words: &[String]) -> String {
        let lower = content.to_lowercase();
        let first_hit = words
            .iter()
            .filter_map(|w| lower.find(w.as_str()))
            .min()
            .map(|byte| lower[..byte].chars().count())
            .unwrap_or(0);

        let total = content.chars().count();
        let start = first_hit.saturating_sub(EXCERPT_CHARS / 2);
        let end = (start + EXCERPT_CHARS).min(total);
        let start = end.saturating_sub(EXCERPT_CHARS);

        let body: String = content.chars().skip(start).take(end - start).collect();
        let mut excerpt = String::with_capacity(body.len() + 6);
        if start > 0 {
            excerpt.push_str("...");
        }
        excerpt.push_str(body.trim());
        if end < total {
            excerpt.push_str("...");
        }
        excerpt
    }
}

#[async_trait]
impl PluginAdapter for KeywordDocumentIndex {
    fn name(&self) -> &str {
        "keyword-documents"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::DocumentSearch
    }

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        if self.documents.is_empty() {
            Ok(HealthStatus::Degraded("no documents loaded".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), KestrelError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentSearch for KeywordDocumentIndex {
    async fn search(&self, query: &str) -> Result<Vec<DocumentHit>, KestrelError> {
        let words: Vec<String> = indexable_words(query)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut matches: HashMap<usize, Vec<String>> = HashMap::new();
        for word in &words {
            if let Some(docs) = self.index.get(word) {
                for &doc in docs {
                    matches.entry(doc).or_default().push(word.clone());
                }
            }
        }

        let mut ranked: Vec<(usize, Vec<String>)> = matches.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.len()
                .cmp(&a.1.len())
                .then_with(|| self.documents[a.0].source.cmp(&self.documents[b.0].source))
        });

        Ok(ranked
            .into_iter()
            .take(TOP_HITS)
            .map(|(doc, matched)| {
                let doc = &self.documents[doc];
                DocumentHit {
                    source: doc.source.clone(),
                    excerpt: Self::excerpt(&doc.content, &matched),
                    score: matched.len() as u32,
                }
            })
            .collect())
    }

    fn document_count(&self) -> usize {
        self.documents.len()
    }
}
