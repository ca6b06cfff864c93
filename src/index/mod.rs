// Vector index module
// In-process store of (vector, passage, metadata) entries with cosine and
// diversity-aware search, persisted as one atomically-swapped bundle.


use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::access::DepartmentTag;
use crate::{ChatError, Result};

/// Bundle layout version, bumped on incompatible changes.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Per-passage metadata carried alongside each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub department: DepartmentTag,
    pub doc_id: String,
    pub chunk_seq: usize,
    pub source: String,
}

/// One indexed passage: the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Unique within the index; composed as `{doc_id}_chunk_{seq}`.
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: EntryMetadata,
}

/// Index-wide metadata recorded at build time. The embedding model
/// identifier is checked at query time: mixing models across build and
/// query is a configuration error, not a silent mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub format_version: u32,
    pub embedding_model: String,
    /// Vector dimension, auto-detected from the first inserted entry.
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
}

/// A scored retrieval candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Cosine similarity against the query vector, in [-1, 1].
    pub score: f32,
    pub entry: IndexEntry,
}

/// The sole owner of all index entries. Append-only during ingestion,
/// read-only during serving; rebuilds happen in a fresh instance that
/// replaces the persisted bundle atomically.
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorIndex {
    metadata: IndexMetadata,
    entries: Vec<IndexEntry>,
    #[serde(skip)]
    ids: HashSet<String>,
}

impl VectorIndex {
    /// Create an empty index stamped with the embedding model that will
    /// populate it.
    #[inline]
    pub fn new(embedding_model: &str) -> Self {
        Self {
            metadata: IndexMetadata {
                format_version: INDEX_FORMAT_VERSION,
                embedding_model: embedding_model.to_string(),
                dimension: 0,
                built_at: Utc::now(),
            },
            entries: Vec::new(),
            ids: HashSet::new(),
        }
    }

    #[inline]
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert one entry. The vector dimension is locked in by the first
    /// insert; later entries must match it, and chunk ids must be unique.
    #[inline]
    pub fn add(&mut self, entry: IndexEntry) -> Result<()> {
        if entry.vector.is_empty() {
            return Err(ChatError::Index(format!(
                "Entry '{}' has an empty embedding vector",
                entry.chunk_id
            )));
        }

        if self.metadata.dimension == 0 {
            self.metadata.dimension = entry.vector.len();
            debug!("Index dimension set to {}", self.metadata.dimension);
        } else if entry.vector.len() != self.metadata.dimension {
            return Err(ChatError::Index(format!(
                "Entry '{}' has dimension {} but the index holds {}-dimensional vectors",
                entry.chunk_id,
                entry.vector.len(),
                self.metadata.dimension
            )));
        }

        if !self.ids.insert(entry.chunk_id.clone()) {
            return Err(ChatError::Index(format!(
                "Duplicate chunk id '{}'",
                entry.chunk_id
            )));
        }

        self.entries.push(entry);
        Ok(())
    }

    /// Nearest-neighbor search by cosine similarity.
    ///
    /// Returns up to `k` hits in descending score order; equal scores are
    /// broken by chunk id so results are deterministic.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        if query.len() != self.metadata.dimension {
            return Err(ChatError::Index(format!(
                "Query vector has dimension {} but the index holds {}-dimensional vectors",
                query.len(),
                self.metadata.dimension
            )));
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                cosine_similarity(query, &entry.vector).map(|score| SearchHit {
                    score,
                    entry: entry.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.entry.chunk_id.cmp(&b.entry.chunk_id))
        });
        hits.truncate(k);

        debug!("Search returned {} of up to {} hits", hits.len(), k);
        Ok(hits)
    }

    /// Diversity-aware search: maximal-marginal-relevance selection over a
    /// `fetch_k` cosine pool.
    ///
    /// The first pick is the top-relevance hit; each further pick maximizes
    /// `lambda * relevance - (1 - lambda) * max-similarity-to-selected`,
    /// trading some top-rank relevance for reduced redundancy among the
    /// returned set. `lambda = 1.0` degenerates to plain nearest-neighbor.
    #[inline]
    pub fn search_diverse(
        &self,
        query: &[f32],
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<SearchHit>> {
        let mut pool = self.search(query, fetch_k.max(k))?;

        if pool.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut selected = vec![pool.remove(0)];

        while selected.len() < k && !pool.is_empty() {
            let mut best_pos = 0;
            let mut best_score = f32::NEG_INFINITY;

            for (pos, candidate) in pool.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .filter_map(|hit| {
                        cosine_similarity(&candidate.entry.vector, &hit.entry.vector)
                    })
                    .fold(0.0_f32, f32::max);
                let mmr_score = lambda * candidate.score - (1.0 - lambda) * redundancy;

                if mmr_score > best_score {
                    best_score = mmr_score;
                    best_pos = pos;
                }
            }

            selected.push(pool.remove(best_pos));
        }

        debug!(
            "Diversity selection kept {} of a {}-candidate pool",
            selected.len(),
            selected.len() + pool.len()
        );
        Ok(selected)
    }

    /// Serialize the full entry set to `path` as one bundle.
    ///
    /// The bundle is written to a sibling temp file and renamed into place,
    /// so a concurrent loader sees either the previous bundle or the new
    /// one, never a partial write.
    #[inline]
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ChatError::Index(format!(
                        "Failed to create index directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let serialized = serde_json::to_string(self)
            .map_err(|e| ChatError::Index(format!("Failed to serialize index: {}", e)))?;

        let mut tmp_path = path.as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = std::path::PathBuf::from(tmp_path);

        fs::write(&tmp_path, serialized).map_err(|e| {
            ChatError::Index(format!(
                "Failed to write index bundle {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        fs::rename(&tmp_path, path).map_err(|e| {
            ChatError::Index(format!(
                "Failed to swap index bundle into {}: {}",
                path.display(),
                e
            ))
        })?;

        info!(
            "Persisted index with {} entries ({} dims, model {}) to {}",
            self.entries.len(),
            self.metadata.dimension,
            self.metadata.embedding_model,
            path.display()
        );
        Ok(())
    }

    /// Load a bundle previously written by [`VectorIndex::persist`].
    ///
    /// Round-trip law: a loaded index reproduces the search results and
    /// scores of the index that persisted it.
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ChatError::Index(format!(
                "Failed to read index bundle {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut index: VectorIndex = serde_json::from_str(&content)
            .map_err(|e| ChatError::Index(format!("Failed to parse index bundle: {}", e)))?;

        if index.metadata.format_version != INDEX_FORMAT_VERSION {
            return Err(ChatError::Index(format!(
                "Unsupported index format version {} (expected {})",
                index.metadata.format_version, INDEX_FORMAT_VERSION
            )));
        }

        index.ids = HashSet::with_capacity(index.entries.len());
        for entry in &index.entries {
            if entry.vector.len() != index.metadata.dimension {
                return Err(ChatError::Index(format!(
                    "Corrupt index bundle: entry '{}' has dimension {} but metadata says {}",
                    entry.chunk_id,
                    entry.vector.len(),
                    index.metadata.dimension
                )));
            }
            if !index.ids.insert(entry.chunk_id.clone()) {
                return Err(ChatError::Index(format!(
                    "Corrupt index bundle: duplicate chunk id '{}'",
                    entry.chunk_id
                )));
            }
        }

        info!(
            "Loaded index with {} entries ({} dims, model {}) from {}",
            index.entries.len(),
            index.metadata.dimension,
            index.metadata.embedding_model,
            path.display()
        );
        Ok(index)
    }
}

/// Cosine similarity between two vectors, `None` when either vector is
/// empty, mismatched, or zero-norm.
#[inline]
pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
    if lhs.is_empty() || lhs.len() != rhs.len() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut lhs_norm = 0.0_f32;
    let mut rhs_norm = 0.0_f32;

    for (l, r) in lhs.iter().zip(rhs.iter()) {
        dot += l * r;
        lhs_norm += l * l;
        rhs_norm += r * r;
    }

    if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
        return None;
    }

    Some((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}
