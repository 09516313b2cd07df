//! `filemind`: index local documents, search them semantically and ask
//! questions about them.
//!
//! Configuration comes from `config.toml`, `config.<env>.toml` and `APP_*`
//! environment variables; logs go to stderr so `--json` output on stdout stays
//! machine-readable.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use filemind_assist::Assistant;
use filemind_core::config::{Config, Settings};
use filemind_core::extract::PlainTextExtractor;
use filemind_core::scan::KeywordScan;
use filemind_core::traits::TextExtractor;
use filemind_core::types::{ChatMessage, IndexEvent, RunSummary, ScanProgress};
use filemind_embed::{chat_gateway, embedding_gateway};
use filemind_vector::{IndexingPipeline, PipelineOptions, Retriever, StoreHandle};

#[derive(Parser)]
#[command(name = "filemind")]
#[command(about = "Semantic search and Q&A over your local documents")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index one or more directories
    Index {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Print progress events as NDJSON
        #[arg(long)]
        json: bool,
    },

    /// Show whether an index exists and how many chunks it holds
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Semantic search over the index
    Search {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the indexed documents
    Ask {
        question: String,

        #[arg(long)]
        json: bool,
    },

    /// Summarize a single document
    Summarize { file: PathBuf },

    /// Ask something about a single document
    Chat { file: PathBuf, message: String },

    /// Sort files by the first keyword found in their name or text
    Scan {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Keyword to look for (repeatable)
        #[arg(short, long = "keyword", required = true)]
        keywords: Vec<String>,

        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn progress_bar(unit: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} ({{percent}}%) {{msg}}"
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn show_progress(pb: &ProgressBar, progress: &ScanProgress) {
    pb.set_length(progress.total_files as u64);
    pb.set_position(progress.files_processed as u64);
}

struct App {
    settings: Settings,
}

impl App {
    fn load() -> Result<Self> {
        let config = Config::load().map_err(|e| {
            eprintln!("Error loading config: {}", e);
            e
        })?;
        Ok(Self { settings: config.settings()? })
    }

    fn open_store(&self) -> Result<Arc<StoreHandle>> {
        let path = self.settings.index.resolved_path();
        let store = StoreHandle::open(&path).with_context(|| format!("failed to open index at {}", path.display()))?;
        Ok(Arc::new(store))
    }

    fn retriever(&self, store: Arc<StoreHandle>) -> Result<Retriever> {
        Ok(Retriever::new(store, embedding_gateway(&self.settings.embedding)?))
    }

    fn assistant(&self) -> Result<Assistant> {
        let retriever = self.retriever(self.open_store()?)?;
        let chat = chat_gateway(&self.settings.chat)?;
        Ok(Assistant::new(retriever, chat, Arc::new(PlainTextExtractor::new()), &self.settings.chat))
    }
}

async fn run_index(app: &App, dirs: Vec<PathBuf>, json: bool) -> Result<()> {
    let store = app.open_store()?;
    let extractor: Arc<dyn TextExtractor> = Arc::new(PlainTextExtractor::new());
    let pipeline = IndexingPipeline::new(
        store.clone(),
        embedding_gateway(&app.settings.embedding)?,
        extractor,
        PipelineOptions::from_settings(&app.settings),
    )?;
    info!(index = %store.path().display(), dirs = dirs.len(), "indexing");

    let pb = if json { None } else { Some(progress_bar("files")?) };
    let mut events = pipeline.index(dirs)?;
    while let Some(event) = events.next().await {
        if json {
            println!("{}", event.to_json_line()?);
        }
        match event {
            IndexEvent::Progress(progress) => {
                if let Some(pb) = &pb {
                    show_progress(pb, &progress);
                }
            }
            IndexEvent::Complete(summary) => {
                if let Some(pb) = &pb {
                    pb.finish_with_message("done");
                    print_summary(&summary);
                }
            }
            IndexEvent::Failed { error } => {
                if let Some(pb) = &pb {
                    pb.abandon_with_message("failed");
                }
                bail!("indexing failed: {error}");
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Indexed {} files: {} new chunks, {} chunks in index", summary.files_processed, summary.new_chunks, summary.total_chunks);
    if summary.files_failed + summary.files_skipped_short + summary.chunks_failed > 0 {
        println!(
            "Skipped: {} unreadable files, {} too short, {} chunks failed to embed",
            summary.files_failed, summary.files_skipped_short, summary.chunks_failed
        );
    }
}

async fn run_status(app: &App, json: bool) -> Result<()> {
    let store = app.open_store()?;
    let status = store.status().await;
    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else if status.has_index {
        println!("Index: {}", store.path().display());
        println!("Chunks: {}", status.count);
    } else {
        println!("No index yet at {}. Run `filemind index <DIR>` first.", store.path().display());
    }
    Ok(())
}

async fn run_search(app: &App, query: &str, json: bool) -> Result<()> {
    let retriever = app.retriever(app.open_store()?)?;
    let hits = match retriever.search(query).await {
        Ok(hits) => hits,
        Err(err) => {
            if json {
                println!("{}", serde_json::json!({ "error": err.to_string() }));
            }
            return Err(err.into());
        }
    };
    if json {
        println!("{}", serde_json::to_string(&serde_json::json!({ "results": hits }))?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No relevant documents found.");
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. {} ({:.3})", i + 1, hit.source_name, hit.score);
        println!("   {}", hit.source_path);
        println!("   {}", hit.preview_text.replace('\n', " "));
    }
    Ok(())
}

async fn run_ask(app: &App, question: &str, json: bool) -> Result<()> {
    let answer = app.assistant()?.ask(question).await?;
    if json {
        println!("{}", serde_json::to_string(&answer)?);
        return Ok(());
    }
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!("\nSources:");
        for source in &answer.sources {
            println!("  - {} ({})", source.source_name, source.source_path);
        }
    }
    Ok(())
}

async fn run_scan(app: &App, dirs: Vec<PathBuf>, keywords: Vec<String>, json: bool) -> Result<()> {
    let rules = app.settings.indexing.walk_rules();
    let every = app.settings.indexing.progress_every;
    let pb = if json { None } else { Some(progress_bar("files")?) };
    let bar = pb.clone();
    let report = tokio::task::spawn_blocking(move || {
        let extractor = PlainTextExtractor::new();
        KeywordScan::new(&keywords, &rules, &extractor).progress_every(every).run(&dirs, |progress| match &bar {
            Some(pb) => show_progress(pb, &progress),
            None => {
                if let Ok(line) = IndexEvent::Progress(progress).to_json_line() {
                    println!("{line}");
                }
            }
        })
    })
    .await?;

    if let Some(pb) = &pb {
        pb.finish_with_message("done");
    }
    if json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }
    println!("Scanned {} files, {} matched", report.files_processed, report.matched_files());
    if report.files_failed > 0 {
        println!("{} files could not be read and were matched on name only", report.files_failed);
    }
    for (keyword, files) in &report.matches {
        println!("{keyword} ({})", files.len());
        for file in files {
            let hit = if file.in_name { "name" } else { "text" };
            println!("  {} [{hit}]", file.path);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let app = App::load()?;

    match cli.command {
        Commands::Index { dirs, json } => run_index(&app, dirs, json).await?,
        Commands::Status { json } => run_status(&app, json).await?,
        Commands::Search { query, json } => run_search(&app, &query, json).await?,
        Commands::Ask { question, json } => run_ask(&app, &question, json).await?,
        Commands::Summarize { file } => {
            let summary = app.assistant()?.summarize(&file).await?;
            println!("{summary}");
        }
        Commands::Chat { file, message } => {
            let reply = app.assistant()?.chat_with_document(&file, &[ChatMessage::user(message)]).await?;
            println!("{reply}");
        }
        Commands::Scan { dirs, keywords, json } => run_scan(&app, dirs, keywords, json).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_index_and_scan_arguments() {
        let cli = Cli::try_parse_from(["filemind", "-v", "index", "docs", "notes", "--json"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Index { dirs, json } => {
                assert_eq!(dirs, vec![PathBuf::from("docs"), PathBuf::from("notes")]);
                assert!(json);
            }
            _ => panic!("expected index"),
        }

        let cli = Cli::try_parse_from(["filemind", "scan", "inbox", "-k", "invoice", "--keyword", "tax"]).unwrap();
        match cli.command {
            Commands::Scan { keywords, .. } => assert_eq!(keywords, vec!["invoice", "tax"]),
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn index_requires_a_directory() {
        assert!(Cli::try_parse_from(["filemind", "index"]).is_err());
        assert!(Cli::try_parse_from(["filemind", "scan", "inbox"]).is_err());
    }
}
