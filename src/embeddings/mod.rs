// Embeddings module
// Chunking plus the embedding/generation service boundary

pub mod chunking;
pub mod ollama;

use crate::Result;

pub use chunking::{Chunk, ChunkingConfig, split_text};
pub use ollama::OllamaClient;

/// Boundary to the embedding service: maps text to a fixed-dimension dense
/// vector. Deterministic for a given model version; vectors from different
/// model versions must never be mixed within one index.
pub trait EmbeddingProvider {
    /// Identifier of the embedding model, recorded in index metadata and
    /// checked again at query time.
    fn model_id(&self) -> &str;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order. The default forwards to
    /// [`EmbeddingProvider::embed`] one text at a time.
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Boundary to the text-completion service used for answer generation.
pub trait GenerationProvider {
    /// Model identifier, for logging and status output.
    fn model_id(&self) -> &str;

    /// Produce a completion for the given prompt.
    fn generate(&self, prompt: &str) -> Result<String>;
}
