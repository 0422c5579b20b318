//! notesync CLI tool
//!
//! Command-line interface for inspecting notes and running one-shot syncs with notesync-core.
//!
//! ## Commands
//!
//! - `parse <file>`: Parse one note and print its metadata as JSON
//! - `graph <dir>`: Build the note graph of a directory and print tag, date and backlink
//!   summaries
//! - `sync --config <file>`: Load the persisted context, pull, push anything pending and print
//!   the resulting status
//!
//! Set `RUST_LOG=debug` for a trace of the sync state machine.

use clap::{Parser, Subcommand};
use notesync_core::{
    config::{ConfigProvider, SyncConfig, TomlConfigProvider},
    event::Event,
    graph::NoteGraph,
    note::{parse_note, NoteId},
    sync::{FsNoteStore, JsonContextStore, NoteStore, SyncEngine, SyncService},
    NotesyncError,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc::unbounded_channel;
use walkdir::WalkDir;

const DEFAULT_CONTEXT_PATH: &str = "notesync-context.json";

#[derive(Parser)]
#[command(name = "notesync")]
#[command(author, version, about = "Inspect and synchronize markdown notes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single note and print its title, frontmatter, links, tags and dates
    Parse {
        /// Path to the note
        path: PathBuf,
    },

    /// Build the note graph of a directory of `<id>.md` files
    Graph {
        /// Directory holding the notes
        path: PathBuf,

        /// Also list every note with its backlinks
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run one sync cycle against the configured remote store
    Sync {
        /// Configuration file path
        #[arg(short, long, default_value = "notesync.toml")]
        config: PathBuf,

        /// Print sync events as they happen
        #[arg(short, long)]
        verbose: bool,
    },
}

fn read_corpus(dir: &Path) -> Result<Vec<(NoteId, String)>, NotesyncError> {
    let mut corpus = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(id) = NoteId::from_path(&entry.file_name().to_string_lossy()) else {
            continue;
        };
        corpus.push((id, std::fs::read_to_string(entry.path())?));
    }
    Ok(corpus)
}

fn print_graph(graph: &NoteGraph, verbose: bool) {
    println!("{} notes", graph.len());
    println!("\nTags:");
    for (tag, count) in graph.tags() {
        println!("  #{tag} ({count})");
    }
    println!("\nDates:");
    for date in graph.dates() {
        println!("  {date} ({})", graph.notes_on_date(date).len());
    }
    if verbose {
        println!("\nNotes:");
        for note in graph.notes().values() {
            let backlinks: Vec<&str> = note.backlinks.iter().map(NoteId::as_str).collect();
            println!("  {} {:?} <- [{}]", note.id, note.title, backlinks.join(", "));
        }
    }
}

#[cfg(feature = "github")]
fn github_store(config: &SyncConfig) -> Result<Arc<dyn NoteStore>, NotesyncError> {
    use notesync_core::sync::GitHubNoteStore;
    let store = match &config.api_url {
        Some(api_url) => GitHubNoteStore::with_api_url(api_url)?,
        None => GitHubNoteStore::new()?,
    };
    Ok(Arc::new(store))
}

#[cfg(not(feature = "github"))]
fn github_store(_config: &SyncConfig) -> Result<Arc<dyn NoteStore>, NotesyncError> {
    Err(NotesyncError::Command(
        "no remote_dir configured and GitHub support is not compiled in".to_string(),
    ))
}

fn note_store(config: &SyncConfig) -> Result<Arc<dyn NoteStore>, NotesyncError> {
    match &config.remote_dir {
        Some(dir) => Ok(Arc::new(FsNoteStore::new(dir.clone()))),
        None => github_store(config),
    }
}

async fn sync_once(config: SyncConfig, verbose: bool) -> Result<(), NotesyncError> {
    let store = note_store(&config)?;
    let context_path = config
        .context_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTEXT_PATH));
    let (tx, mut rx) = unbounded_channel::<Event>();
    let engine = SyncEngine::new(store, Arc::new(JsonContextStore::new(context_path)), config)
        .with_events(tx);
    let (sync, task) = SyncService::spawn(engine);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if verbose {
                if let Event::Sync(event) = event {
                    println!("{event}");
                }
            }
        }
    });

    sync.settled().await?;
    let status = sync.status().await?;
    drop(sync);
    task.await?;
    printer.await?;

    println!("{}", serde_json::to_string_pretty(&status)?);
    match status.last_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { path } => {
            let body = std::fs::read_to_string(&path)?;
            let parsed = parse_note(&body)?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            Ok(())
        }

        Commands::Graph { path, verbose } => {
            let graph = NoteGraph::from_corpus(read_corpus(&path)?);
            print_graph(&graph, verbose);
            Ok(())
        }

        Commands::Sync { config, verbose } => {
            let config = TomlConfigProvider::new(config).get_config()?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(sync_once(config, verbose))?;
            Ok(())
        }
    }
}
