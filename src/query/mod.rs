// Query engine module
// Per-request pipeline: embed -> retrieve -> filter -> context -> prompt -> generate


use itertools::Itertools;
use tracing::{debug, info};

use crate::access::{self, Department, DepartmentTag};
use crate::config::RetrievalConfig;
use crate::embeddings::{EmbeddingProvider, GenerationProvider};
use crate::index::{SearchHit, VectorIndex};
use crate::{ChatError, Result};

/// Fixed response rendered when the permission filter removes every
/// retrieved candidate. Callers must show this instead of a generated
/// answer; the generation service is never contacted in that case.
pub const NO_ACCESSIBLE_DOCUMENTS_MESSAGE: &str =
    "No relevant documents were found for your access level.";

/// Appended when the combined context exceeds its character budget, so a
/// cut-off context block is never mistaken for a complete passage.
pub const CONTEXT_TRUNCATION_MARKER: &str = " …[context truncated]";

/// A passage that was actually placed in the generation context, returned
/// so callers can show provenance for every answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePassage {
    pub chunk_id: String,
    pub doc_id: String,
    pub source: String,
    pub department: DepartmentTag,
    pub text: String,
    pub score: f32,
}

/// Result of one query. `NoAccessibleDocuments` is a normal outcome, not an
/// error; service failures surface as `ChatError` instead so callers can
/// always distinguish "nothing visible" from "something broke".
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Answered {
        answer: String,
        sources: Vec<SourcePassage>,
    },
    NoAccessibleDocuments,
}

/// Stateless per-request orchestrator over an index snapshot and the
/// embedding/generation services. All dependencies are injected; queries
/// mutate nothing, so any number may run against one snapshot.
pub struct QueryEngine<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn EmbeddingProvider,
    generator: &'a dyn GenerationProvider,
    retrieval: RetrievalConfig,
}

impl std::fmt::Debug for QueryEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("embedding_model", &self.embedder.model_id())
            .field("generation_model", &self.generator.model_id())
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl<'a> QueryEngine<'a> {
    /// Wire up an engine, verifying that the query-time embedding model is
    /// the one the index was built with. A mismatch is a configuration
    /// error caught here, before any question is served.
    #[inline]
    pub fn new(
        index: &'a VectorIndex,
        embedder: &'a dyn EmbeddingProvider,
        generator: &'a dyn GenerationProvider,
        retrieval: RetrievalConfig,
    ) -> Result<Self> {
        let index_model = &index.metadata().embedding_model;
        if index_model != embedder.model_id() {
            return Err(ChatError::Config(format!(
                "Index was built with embedding model '{}' but the configured model is '{}'; \
                 rebuild the index or fix the configuration",
                index_model,
                embedder.model_id()
            )));
        }

        Ok(Self {
            index,
            embedder,
            generator,
            retrieval,
        })
    }

    /// Answer a question on behalf of a requester department.
    ///
    /// Candidates the requester may not see are dropped, in place, before
    /// context assembly; if nothing survives, the fixed no-match outcome is
    /// returned without calling the generation service.
    #[inline]
    pub fn answer(&self, question: &str, requester: Department) -> Result<QueryOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::Config("Question cannot be empty".to_string()));
        }

        debug!("Answering question for department '{}'", requester);

        let query_vector = self.embedder.embed(question)?;

        let candidates = self.index.search_diverse(
            &query_vector,
            self.retrieval.top_k,
            self.retrieval.fetch_k,
            self.retrieval.mmr_lambda,
        )?;
        debug!("Retrieved {} candidates", candidates.len());

        let retained: Vec<SearchHit> = candidates
            .into_iter()
            .filter(|hit| {
                let visible = access::is_visible(requester, &hit.entry.metadata.department);
                if !visible {
                    access::path_grant_hint(
                        requester,
                        &hit.entry.metadata.department,
                        &hit.entry.metadata.source,
                    );
                    debug!(
                        "Filtered '{}' (tag '{}') for requester '{}'",
                        hit.entry.chunk_id, hit.entry.metadata.department, requester
                    );
                }
                visible
            })
            .collect();

        if retained.is_empty() {
            info!(
                "No retrieved passages visible to department '{}'",
                requester
            );
            return Ok(QueryOutcome::NoAccessibleDocuments);
        }

        let used = &retained[..retained.len().min(self.retrieval.context_passages)];
        let context = assemble_context(used, self.retrieval.max_context_chars);
        let prompt = build_prompt(requester, question, &context);

        let answer = self.generator.generate(&prompt)?;

        let sources = used
            .iter()
            .map(|hit| SourcePassage {
                chunk_id: hit.entry.chunk_id.clone(),
                doc_id: hit.entry.metadata.doc_id.clone(),
                source: hit.entry.metadata.source.clone(),
                department: hit.entry.metadata.department.clone(),
                text: hit.entry.text.clone(),
                score: hit.score,
            })
            .collect();

        info!(
            "Answered question for '{}' using {} passages",
            requester,
            used.len()
        );
        Ok(QueryOutcome::Answered { answer, sources })
    }
}

/// Concatenate passages into one context block, truncated to `max_chars`
/// characters with a visible marker.
fn assemble_context(passages: &[SearchHit], max_chars: usize) -> String {
    let combined = passages
        .iter()
        .map(|hit| hit.entry.text.as_str())
        .join("\n\n");

    if combined.chars().count() <= max_chars {
        return combined;
    }

    let mut truncated: String = combined.chars().take(max_chars).collect();
    truncated.push_str(CONTEXT_TRUNCATION_MARKER);
    truncated
}

/// Role-aware prompt embedding the question, the assembled context, and the
/// requester's department.
fn build_prompt(department: Department, question: &str, context: &str) -> String {
    format!(
        "You are a knowledgeable assistant specializing in {department} department information. \
Your goal is to provide accurate, helpful, and contextually relevant answers to employee \
inquiries.\n\n\
Use only the details found in the provided context to construct your response. If the question \
is factual and the answer is not present in the context, respond with: \"I do not know the \
answer to that question.\" If the question is not factual (a greeting, small talk), respond \
politely without referencing the context.\n\n\
Question: {question}\n\n\
Context:\n{context}\n\n\
Your response should be clear, concise, grounded in the context above, and free from personal \
opinions or unverifiable details.",
        department = department,
        question = question,
        context = context
    )
}
