use std::collections::BTreeMap;
use std::path::Path;

use console::style;
use tracing::info;

use crate::access::Department;
use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::index::VectorIndex;
use crate::indexer::{IndexBuilder, is_ingest_running};
use crate::query::{NO_ACCESSIBLE_DOCUMENTS_MESSAGE, QueryEngine, QueryOutcome};
use crate::{ChatError, Result};

/// Build (or rebuild) the serving index from a corpus directory.
#[inline]
pub fn ingest(corpus_dir: &Path) -> Result<()> {
    let config = Config::load()?;

    info!("Ingesting corpus from {}", corpus_dir.display());

    let client = OllamaClient::new(&config.ollama)?;
    client.health_check()?;

    let builder = IndexBuilder::new(config.chunking.clone(), &client).with_progress(true);
    let report = builder.run(
        corpus_dir,
        &config.index_path(),
        &config.ingest_lock_path(),
    )?;

    println!("{}", style("Ingestion complete").bold().green());
    println!("  Documents indexed: {}", report.documents_indexed);
    println!("  Chunks indexed: {}", report.chunks_indexed);
    if report.documents_skipped > 0 {
        println!(
            "  {} {} skipped (no recognized department segment or unreadable)",
            style("⚠").yellow(),
            report.documents_skipped
        );
    }
    println!("  Index file: {}", config.index_path().display());

    Ok(())
}

/// Answer a question on behalf of a department and print the answer with
/// its source passages.
#[inline]
pub fn ask(question: &str, department: &str) -> Result<()> {
    let config = Config::load()?;
    let requester: Department = department.parse()?;

    let index_path = config.index_path();
    if !index_path.exists() {
        return Err(ChatError::Index(format!(
            "No index found at {}; run 'dept-chat ingest <corpus-dir>' first",
            index_path.display()
        )));
    }
    let index = VectorIndex::load(&index_path)?;

    let client = OllamaClient::new(&config.ollama)?;
    let engine = QueryEngine::new(&index, &client, &client, config.retrieval.clone())?;

    match engine.answer(question, requester)? {
        QueryOutcome::Answered { answer, sources } => {
            println!("{}", answer.trim());
            println!();
            println!("{}", style("Sources:").bold());
            for (rank, source) in sources.iter().enumerate() {
                println!(
                    "  {}. {} [{}] (score {:.3})",
                    rank + 1,
                    source.source,
                    source.department,
                    source.score
                );
            }
        }
        QueryOutcome::NoAccessibleDocuments => {
            println!("{}", NO_ACCESSIBLE_DOCUMENTS_MESSAGE);
        }
    }

    Ok(())
}

/// Show the state of the serving index and any in-flight ingestion.
#[inline]
pub fn status() -> Result<()> {
    let config = Config::load()?;

    println!("{}", style("📚 Index Status").bold().cyan());
    println!();

    if is_ingest_running(&config.ingest_lock_path()) {
        println!(
            "{}",
            style("An ingestion run is currently in progress.").yellow()
        );
        println!();
    }

    let index_path = config.index_path();
    if !index_path.exists() {
        println!("No index has been built yet.");
        println!("Use 'dept-chat ingest <corpus-dir>' to build one.");
        return Ok(());
    }

    let index = VectorIndex::load(&index_path)?;
    let metadata = index.metadata();

    let document_count = index
        .entries()
        .iter()
        .map(|entry| entry.metadata.doc_id.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();

    println!("  Entries: {}", index.len());
    println!("  Documents: {}", document_count);
    println!("  Embedding model: {}", metadata.embedding_model);
    println!("  Vector dimension: {}", metadata.dimension);
    println!(
        "  Built: {}",
        metadata.built_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Index file: {}", index_path.display());

    let mut per_department: BTreeMap<String, usize> = BTreeMap::new();
    for entry in index.entries() {
        *per_department
            .entry(entry.metadata.department.to_string())
            .or_insert(0) += 1;
    }

    if !per_department.is_empty() {
        println!();
        println!("{}", style("Entries by department:").bold());
        for (department, count) in &per_department {
            println!("  {}: {}", department, count);
        }
    }

    Ok(())
}
