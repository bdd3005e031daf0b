//! docmind CLI - Command-line interface for the document intelligence engine.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use ulid::Ulid;

use docmind_agent::CancelHandle;
use docmind_core::DocmindConfig;
use docmind_engine::DefaultEngine;

/// docmind - Local document intelligence with retrieval-augmented answers
#[derive(Parser)]
#[command(name = "docmind")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: user config dir, then ./docmind.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides configuration)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file or directory of text documents
    Ingest {
        /// Path to file or directory
        path: PathBuf,

        /// Recursively process directories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Ask a question against the ingested corpus
    Query {
        /// Question text
        text: String,

        /// Number of passages to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the full step trace after the answer
        #[arg(long)]
        trace: bool,
    },

    /// Delete a document and everything derived from it
    Delete {
        /// Document id (ULID)
        document_id: String,
    },

    /// Show knowledge base statistics
    Stats,

    /// List the tools available to the agent
    Tools,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(cli: &Cli) -> Result<DocmindConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => DocmindConfig::load(path)?,
        None => DocmindConfig::load_default()?,
    };
    if let Some(database) = &cli.database {
        config.database.path = database.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_config(&cli)?;
    if let Commands::Query {
        top_k: Some(k), ..
    } = &cli.command
    {
        config.retrieval.top_k = *k;
    }

    let engine = DefaultEngine::open(config)?;

    match cli.command {
        Commands::Ingest { path, recursive } => {
            ingest(&engine, &path, recursive).await?;
        }
        Commands::Query { text, trace, .. } => {
            query(&engine, &text, trace).await?;
        }
        Commands::Delete { document_id } => {
            let id: Ulid = document_id
                .parse()
                .map_err(|_| format!("invalid document id: {}", document_id))?;
            let report = engine.delete_document(id).await?;
            println!(
                "Deleted document {} ({} chunks, {} index entries)",
                report.document_id, report.chunks_removed, report.entries_removed
            );
        }
        Commands::Stats => {
            let stats = engine.stats()?;
            println!("Documents: {}", stats.documents);
            println!("Chunks:    {}", stats.chunks);
            println!("Entries:   {}", stats.entries);
            println!("Dimension: {}", stats.dimension);
        }
        Commands::Tools => {
            for name in engine.tool_names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

async fn ingest(
    engine: &DefaultEngine,
    path: &PathBuf,
    recursive: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_files(path, recursive)?;

    if files.is_empty() {
        println!("No supported files found at: {}", path.display());
        return Ok(());
    }

    println!("Ingesting {} file(s)...", files.len());

    let mut success_count = 0;
    let mut skipped_count = 0;
    let mut error_count = 0;

    for file_path in files {
        let content = match fs::read_to_string(&file_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("  {} - Error reading: {}", file_path.display(), e);
                error_count += 1;
                continue;
            }
        };

        let source_uri = format!("file://{}", file_path.canonicalize()?.display());

        match engine.ingest_document(&source_uri, &content).await {
            Ok(report) if report.deduplicated => {
                println!(
                    "  {} - already ingested as {}",
                    file_path.display(),
                    report.document_id
                );
                skipped_count += 1;
            }
            Ok(report) => {
                println!(
                    "  {} - OK ({} chunks, id {})",
                    file_path.display(),
                    report.chunks,
                    report.document_id
                );
                success_count += 1;
            }
            Err(e) => {
                eprintln!("  {} - Error: {}", file_path.display(), e);
                error_count += 1;
            }
        }
    }

    println!(
        "\nComplete: {} ingested, {} skipped, {} failed",
        success_count, skipped_count, error_count
    );

    Ok(())
}

async fn query(
    engine: &DefaultEngine,
    text: &str,
    show_trace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancelHandle::new();

    // Ctrl-C requests cooperative cancellation; the in-flight step finishes.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let session = engine.submit_query(text, cancel).await?;

    match session.final_answer {
        Some(answer) => {
            if session.partial {
                println!("(partial answer, step limit reached)\n");
            }
            println!("{}", answer);
        }
        None => {
            eprintln!(
                "Session {:?}: {}",
                session.status,
                session
                    .failure_reason
                    .as_deref()
                    .unwrap_or("no answer produced")
            );
        }
    }

    if show_trace {
        println!("\nTrace ({} steps):", session.trace.len());
        for step in &session.trace {
            println!("  [{}] {}", step.step_index, serde_json::to_string(&step.action)?);
            println!("      -> {}", serde_json::to_string(&step.observation)?);
        }
    }

    Ok(())
}

fn collect_files(path: &PathBuf, recursive: bool) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();

    if path.is_file() {
        if is_supported_file(path) {
            files.push(path.clone());
        }
    } else if path.is_dir() {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let entry_path = entry.path();

            if entry_path.is_file() && is_supported_file(&entry_path) {
                files.push(entry_path);
            } else if entry_path.is_dir() && recursive {
                files.extend(collect_files(&entry_path, recursive)?);
            }
        }
    }

    Ok(files)
}

fn is_supported_file(path: &PathBuf) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(ext, "txt" | "md" | "csv" | "json" | "log")
}
