// Corpus module
// Loads documents from a department-partitioned directory tree and derives
// their access tags from the path convention.


use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::access::DepartmentTag;
use crate::{ChatError, Result};

/// File extensions recognized as corpus documents.
const DOCUMENT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// A document loaded from the corpus, immutable once indexed. Re-ingestion
/// replaces its index entries rather than mutating them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Deterministic identifier derived from the relative source path, so
    /// re-ingesting an unchanged corpus reproduces the same chunk ids.
    pub id: String,
    /// Relative source path as found under the corpus root.
    pub source: String,
    /// Raw text content.
    pub text: String,
    /// Department visibility inherited by every chunk of this document.
    pub tag: DepartmentTag,
}

/// A document dropped during loading, reported rather than silently lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub source: String,
    pub reason: String,
}

/// Result of walking a corpus directory.
#[derive(Debug, Default)]
pub struct CorpusLoad {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedDocument>,
}

/// Derive the department tag from a relative source path.
///
/// The first directory segment naming a known department (or the broadcast
/// segment "general") wins; paths without a recognized segment yield `None`
/// and the document is dropped from ingestion, with a warning.
#[inline]
pub fn tag_for_source(relative_path: &Path) -> Option<DepartmentTag> {
    let directories = relative_path.parent()?;

    directories.components().find_map(|component| match component {
        Component::Normal(segment) => segment
            .to_str()
            .and_then(DepartmentTag::from_path_segment),
        _ => None,
    })
}

/// Derive a stable document id from the relative source path.
#[inline]
pub fn document_id(relative_path: &Path) -> String {
    relative_path
        .to_string_lossy()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Load every recognized document under `corpus_dir`.
///
/// An unreadable corpus root is fatal; an unreadable or untagged individual
/// document is recorded as skipped and does not abort the load. Files are
/// visited in sorted path order so repeated loads are deterministic.
#[inline]
pub fn load_corpus(corpus_dir: &Path) -> Result<CorpusLoad> {
    if !corpus_dir.is_dir() {
        return Err(ChatError::Corpus(format!(
            "Corpus path is not a readable directory: {}",
            corpus_dir.display()
        )));
    }

    let mut files = Vec::new();
    collect_document_files(corpus_dir, &mut files)?;
    files.sort();

    let mut load = CorpusLoad::default();

    for path in files {
        let relative = path.strip_prefix(corpus_dir).unwrap_or(&path);
        let source = relative.to_string_lossy().into_owned();

        let Some(tag) = tag_for_source(relative) else {
            warn!(
                "Skipping document '{}': no recognized department segment in path",
                source
            );
            load.skipped.push(SkippedDocument {
                source,
                reason: "no recognized department segment in path".to_string(),
            });
            continue;
        };

        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!("Loaded document '{}' tagged '{}'", source, tag);
                load.documents.push(Document {
                    id: document_id(relative),
                    source,
                    text,
                    tag,
                });
            }
            Err(e) => {
                warn!("Skipping document '{}': {}", source, e);
                load.skipped.push(SkippedDocument {
                    source,
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        "Corpus load complete: {} documents, {} skipped",
        load.documents.len(),
        load.skipped.len()
    );

    Ok(load)
}

fn collect_document_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| {
        ChatError::Corpus(format!(
            "Failed to read corpus directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            ChatError::Corpus(format!(
                "Failed to read corpus entry under {}: {}",
                dir.display(),
                e
            ))
        })?;
        let path = entry.path();

        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }

        if path.is_dir() {
            collect_document_files(&path, files)?;
        } else if has_document_extension(&path) {
            files.push(path);
        }
    }

    Ok(())
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
