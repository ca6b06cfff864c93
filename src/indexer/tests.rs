use super::*;
use crate::access::{Department, DepartmentTag};
use std::path::Path;
use tempfile::TempDir;

/// Deterministic word-bucket embedder: each word hashes into one of `dim`
/// buckets, so cosine similarity tracks word overlap.
struct HashEmbedder {
    dim: usize,
}

impl EmbeddingProvider for HashEmbedder {
    fn model_id(&self) -> &str {
        "hash-embedder"
    }

    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dim];

        for word in text.to_lowercase().split_whitespace() {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in word.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            vector[(hash % self.dim as u64) as usize] += 1.0;
        }

        Ok(vector)
    }
}

struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing-embedder"
    }

    fn embed(&self, _text: &str) -> crate::Result<Vec<f32>> {
        Err(crate::ChatError::Embedding(
            "embedding service unavailable".to_string(),
        ))
    }
}

fn write_doc(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().expect("parent dir")).expect("create dirs");
    std::fs::write(path, content).expect("write file");
}

fn sample_corpus() -> TempDir {
    let temp = TempDir::new().expect("create temp dir");
    write_doc(temp.path(), "hr/policy.txt", "Employees get 15 vacation days.");
    write_doc(temp.path(), "general/welcome.txt", "Welcome to the company.");
    write_doc(temp.path(), "scratch/notes.txt", "untagged scratch notes");
    temp
}

#[test]
fn build_indexes_tagged_documents_and_skips_the_rest() {
    let corpus = sample_corpus();
    let embedder = HashEmbedder { dim: 16 };
    let builder = IndexBuilder::new(ChunkingConfig::default(), &embedder);

    let (index, report) = builder.build(corpus.path()).expect("build should succeed");

    assert_eq!(report.documents_indexed, 2);
    assert_eq!(report.documents_skipped, 1);
    assert_eq!(report.chunks_indexed, 2);
    assert_eq!(index.len(), 2);
    assert_eq!(index.metadata().embedding_model, "hash-embedder");
    assert_eq!(index.metadata().dimension, 16);

    // Untagged documents must not appear in the index at all.
    assert!(
        index
            .entries()
            .iter()
            .all(|e| !e.metadata.source.contains("scratch"))
    );
}

#[test]
fn chunk_ids_compose_doc_id_and_sequence() {
    let corpus = sample_corpus();
    let embedder = HashEmbedder { dim: 16 };
    let builder = IndexBuilder::new(ChunkingConfig::default(), &embedder);

    let (index, _) = builder.build(corpus.path()).expect("build should succeed");

    let mut ids: Vec<&str> = index
        .entries()
        .iter()
        .map(|e| e.chunk_id.as_str())
        .collect();
    ids.sort_unstable();
    assert_eq!(
        ids,
        vec!["general_welcome.txt_chunk_0", "hr_policy.txt_chunk_0"]
    );
}

#[test]
fn chunks_inherit_their_document_tag() {
    let corpus = sample_corpus();
    let embedder = HashEmbedder { dim: 16 };
    let builder = IndexBuilder::new(ChunkingConfig::default(), &embedder);

    let (index, _) = builder.build(corpus.path()).expect("build should succeed");

    for entry in index.entries() {
        let expected = if entry.metadata.source.starts_with("general/") {
            DepartmentTag::Broadcast
        } else {
            DepartmentTag::Single(Department::Hr)
        };
        assert_eq!(entry.metadata.department, expected);
    }
}

#[test]
fn long_documents_split_into_overlapping_chunks() {
    let temp = TempDir::new().expect("create temp dir");
    let words: Vec<String> = (0..12).map(|i| format!("word{}", i)).collect();
    write_doc(temp.path(), "engineering/guide.txt", &words.join(" "));

    let embedder = HashEmbedder { dim: 16 };
    let chunking = ChunkingConfig {
        chunk_size: 5,
        overlap: 1,
    };
    let builder = IndexBuilder::new(chunking, &embedder);

    let (index, report) = builder.build(temp.path()).expect("build should succeed");

    // Window starts at 0, 4, 8.
    assert_eq!(report.chunks_indexed, 3);
    let seqs: Vec<usize> = index
        .entries()
        .iter()
        .map(|e| e.metadata.chunk_seq)
        .collect();
    assert_eq!(seqs, vec![0, 1, 2]);
}

#[test]
fn run_persists_a_loadable_bundle_and_releases_the_lock() {
    let corpus = sample_corpus();
    let state = TempDir::new().expect("create temp dir");
    let index_path = state.path().join("index.json");
    let lock_path = state.path().join(".ingest.lock");

    let embedder = HashEmbedder { dim: 16 };
    let builder = IndexBuilder::new(ChunkingConfig::default(), &embedder);

    let report = builder
        .run(corpus.path(), &index_path, &lock_path)
        .expect("run should succeed");

    assert_eq!(report.chunks_indexed, 2);
    assert!(index_path.exists());
    assert!(!lock_path.exists());

    let loaded = crate::index::VectorIndex::load(&index_path).expect("load bundle");
    assert_eq!(loaded.len(), 2);
}

#[test]
fn concurrent_ingestion_is_rejected() {
    let corpus = sample_corpus();
    let state = TempDir::new().expect("create temp dir");
    let index_path = state.path().join("index.json");
    let lock_path = state.path().join(".ingest.lock");

    // Simulate another run holding the lock.
    std::fs::write(&lock_path, "other-run").expect("write lock");

    let embedder = HashEmbedder { dim: 16 };
    let builder = IndexBuilder::new(ChunkingConfig::default(), &embedder);

    let err = builder
        .run(corpus.path(), &index_path, &lock_path)
        .expect_err("second run should be rejected");
    assert!(matches!(err, ChatError::IngestInProgress));

    // The foreign lock must not be cleaned up by the rejected run.
    assert!(lock_path.exists());
    assert!(!index_path.exists());
}

#[test]
fn embedding_failure_leaves_previous_index_authoritative() {
    let corpus = sample_corpus();
    let state = TempDir::new().expect("create temp dir");
    let index_path = state.path().join("index.json");
    let lock_path = state.path().join(".ingest.lock");

    // First, a successful build.
    let embedder = HashEmbedder { dim: 16 };
    IndexBuilder::new(ChunkingConfig::default(), &embedder)
        .run(corpus.path(), &index_path, &lock_path)
        .expect("initial run should succeed");
    let before = std::fs::read_to_string(&index_path).expect("read bundle");

    // Then a rebuild whose embedding service is down.
    let failing = FailingEmbedder;
    let err = IndexBuilder::new(ChunkingConfig::default(), &failing)
        .run(corpus.path(), &index_path, &lock_path)
        .expect_err("failing rebuild should error");
    assert!(matches!(err, ChatError::Embedding(_)));

    // The previously persisted bundle is untouched and the lock released.
    let after = std::fs::read_to_string(&index_path).expect("read bundle");
    assert_eq!(before, after);
    assert!(!lock_path.exists());
}

#[test]
fn degenerate_chunking_config_fails_before_touching_the_corpus() {
    let corpus = sample_corpus();
    let embedder = HashEmbedder { dim: 16 };
    let chunking = ChunkingConfig {
        chunk_size: 100,
        overlap: 100,
    };
    let builder = IndexBuilder::new(chunking, &embedder);

    let err = builder.build(corpus.path()).expect_err("should reject");
    assert!(matches!(err, ChatError::Config(_)));
}

#[test]
fn rebuilding_an_unchanged_corpus_is_idempotent() {
    let corpus = sample_corpus();
    let embedder = HashEmbedder { dim: 16 };
    let builder = IndexBuilder::new(ChunkingConfig::default(), &embedder);

    let (first, _) = builder.build(corpus.path()).expect("first build");
    let (second, _) = builder.build(corpus.path()).expect("second build");

    let first_ids: Vec<&str> = first.entries().iter().map(|e| e.chunk_id.as_str()).collect();
    let second_ids: Vec<&str> = second
        .entries()
        .iter()
        .map(|e| e.chunk_id.as_str())
        .collect();
    assert_eq!(first_ids, second_ids);

    for (a, b) in first.entries().iter().zip(second.entries()) {
        assert_eq!(a.text, b.text);
        assert_eq!(a.metadata, b.metadata);
        assert_eq!(a.vector, b.vector);
    }
}
