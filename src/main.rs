use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dept_chat::Result;
use dept_chat::commands::{ask, ingest, status};
use dept_chat::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "dept-chat")]
#[command(about = "Role-scoped document Q&A with department-partitioned retrieval")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build (or rebuild) the index from a corpus directory
    Ingest {
        /// Directory holding department-partitioned documents
        corpus_dir: PathBuf,
    },
    /// Ask a question as a member of a department
    Ask {
        /// The question to answer
        question: String,
        /// Requesting department, e.g. "hr" or "engineering"
        #[arg(long)]
        department: String,
    },
    /// Show index and ingestion status
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { corpus_dir } => {
            ingest(&corpus_dir)?;
        }
        Commands::Ask {
            question,
            department,
        } => {
            ask(&question, &department)?;
        }
        Commands::Status => {
            status()?;
        }
    }

    Ok(())
}
