// Indexer module
// Ingestion pipeline: load -> tag -> chunk -> embed -> index -> atomic swap

#[cfg(test)]
mod tests;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::corpus;
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::chunking::{ChunkingConfig, split_text};
use crate::index::{EntryMetadata, IndexEntry, VectorIndex};
use crate::{ChatError, Result};

/// Outcome counters for one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents whose chunks made it into the index.
    pub documents_indexed: usize,
    /// Documents dropped during loading (untagged or unreadable).
    pub documents_skipped: usize,
    /// Entries inserted into the fresh index.
    pub chunks_indexed: usize,
}

/// Builds a fresh vector index from a corpus directory and swaps it into
/// place. Never mutates a previously persisted index: a failed build leaves
/// the prior bundle authoritative.
pub struct IndexBuilder<'a> {
    chunking: ChunkingConfig,
    embedder: &'a dyn EmbeddingProvider,
    show_progress: bool,
}

/// Single-flight guard for ingestion. Holding the lock file rejects a
/// concurrent run; the file is removed when the guard drops, including on
/// error paths.
struct IngestLock {
    path: PathBuf,
}

impl IngestLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(mut file) => {
                let token = Uuid::new_v4();
                let _ = writeln!(file, "{}", token);
                debug!("Acquired ingest lock {} ({})", path.display(), token);
                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(
                    "Ingest lock {} is already held by another run",
                    path.display()
                );
                Err(ChatError::IngestInProgress)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for IngestLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(
                "Failed to remove ingest lock {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Whether an ingestion run currently holds the lock file.
#[inline]
pub fn is_ingest_running(lock_path: &Path) -> bool {
    lock_path.exists()
}

impl<'a> IndexBuilder<'a> {
    #[inline]
    pub fn new(chunking: ChunkingConfig, embedder: &'a dyn EmbeddingProvider) -> Self {
        Self {
            chunking,
            embedder,
            show_progress: false,
        }
    }

    /// Render an indicatif progress bar over documents while embedding.
    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Build a fresh index from every tagged document under `corpus_dir`.
    ///
    /// Untagged or unreadable documents are skipped with a warning; an
    /// embedding-service failure aborts the whole build.
    #[inline]
    pub fn build(&self, corpus_dir: &Path) -> Result<(VectorIndex, IngestReport)> {
        // Degenerate window parameters are a configuration error for the
        // whole run, caught before any document is touched.
        self.chunking.stride()?;

        let load = corpus::load_corpus(corpus_dir)?;
        info!(
            "Building index from {} documents ({} skipped during load)",
            load.documents.len(),
            load.skipped.len()
        );

        let mut index = VectorIndex::new(self.embedder.model_id());
        let mut report = IngestReport {
            documents_indexed: 0,
            documents_skipped: load.skipped.len(),
            chunks_indexed: 0,
        };

        let progress = if self.show_progress {
            Some(ProgressBar::new(load.documents.len() as u64))
        } else {
            None
        };

        for document in &load.documents {
            let chunks = split_text(&document.text, &self.chunking)?;

            if chunks.is_empty() {
                debug!("Document '{}' produced no chunks", document.source);
                if let Some(bar) = &progress {
                    bar.inc(1);
                }
                continue;
            }

            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;

            if vectors.len() != chunks.len() {
                return Err(ChatError::Embedding(format!(
                    "Embedding count mismatch for '{}': {} chunks but {} vectors",
                    document.source,
                    chunks.len(),
                    vectors.len()
                )));
            }

            for (chunk, vector) in chunks.iter().zip(vectors) {
                index.add(IndexEntry {
                    chunk_id: format!("{}_chunk_{}", document.id, chunk.seq),
                    vector,
                    text: chunk.text.clone(),
                    metadata: EntryMetadata {
                        department: document.tag.clone(),
                        doc_id: document.id.clone(),
                        chunk_seq: chunk.seq,
                        source: document.source.clone(),
                    },
                })?;
                report.chunks_indexed += 1;
            }

            report.documents_indexed += 1;
            debug!(
                "Indexed '{}' as {} chunks",
                document.source,
                chunks.len()
            );

            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        info!(
            "Built index with {} entries from {} documents",
            report.chunks_indexed, report.documents_indexed
        );
        Ok((index, report))
    }

    /// Run a complete ingestion: acquire the single-flight lock, build a
    /// fresh index, persist it over `index_path` via the atomic swap.
    ///
    /// On any failure before the swap the previously persisted index stays
    /// authoritative and the lock is released.
    #[inline]
    pub fn run(
        &self,
        corpus_dir: &Path,
        index_path: &Path,
        lock_path: &Path,
    ) -> Result<IngestReport> {
        let _lock = IngestLock::acquire(lock_path)?;

        let (index, report) = self.build(corpus_dir)?;
        index.persist(index_path)?;

        info!(
            "Ingestion complete: {} documents, {} chunks, {} skipped",
            report.documents_indexed, report.chunks_indexed, report.documents_skipped
        );
        Ok(report)
    }
}
