//! CLI entry point for scholarmap.
//!
//! Ingests plain-text papers, groups them into topics and lays them out in
//! 3-D. Every command works against the corpus snapshot under `data_dir`.

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use scholarmap::display::{
    THEME, create_documents_table, create_edges_table, create_progress_bar, create_recompute_table,
    create_spinner, create_topics_table,
};
use scholarmap::io::{ExitCode, JsonResponse, OutputFormat, ResponseMeta};
use scholarmap::{CorpusError, CorpusResult, CorpusStore, DocumentId, Settings};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "scholarmap",
    version = env!("CARGO_PKG_VERSION"),
    about = "Topic maps for document collections",
    long_about = "Embed plain-text papers, cluster them into topics and arrange them in 3-D.",
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ scholarmap init\n  $ scholarmap add paper.txt\n  $ scholarmap papers"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up .scholarmap/ with a default settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Config,

    /// Add one or more .txt/.md papers to the corpus
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Store the papers without re-running the analysis
        #[arg(long)]
        no_recompute: bool,

        #[arg(long)]
        json: bool,
    },

    /// Add every new paper found in a directory (defaults to the inbox)
    Ingest {
        dir: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Re-run clustering and layout over the whole corpus
    Analyze {
        #[arg(long)]
        json: bool,
    },

    /// List papers with their topic, confidence and position
    Papers {
        #[arg(long)]
        json: bool,
    },

    /// Show a single paper
    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Remove a paper and re-run the analysis
    Remove {
        id: String,

        /// Leave topics and positions as they are
        #[arg(long)]
        no_recompute: bool,
    },

    /// List similarity edges between papers
    Edges {
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Add { json, .. }
            | Commands::Ingest { json, .. }
            | Commands::Analyze { json }
            | Commands::Papers { json }
            | Commands::Show { json, .. }
            | Commands::Edges { json } => *json,
            Commands::Init { .. } | Commands::Config | Commands::Remove { .. } => false,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = if let Some(config_path) = &cli.config {
        Settings::load_from(config_path).unwrap_or_else(|e| {
            eprintln!(
                "Configuration error loading from {}: {}",
                config_path.display(),
                e
            );
            std::process::exit(ExitCode::ConfigError.into());
        })
    } else {
        Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        })
    };

    init_tracing(settings.debug);

    match &cli.command {
        Commands::Init { force } => {
            if let Err(e) = init_project(*force) {
                eprintln!("{}", THEME.error_with_icon(&format!("{e:#}")));
                std::process::exit(ExitCode::ConfigError.into());
            }
            return;
        }
        Commands::Config => {
            if let Err(e) = print_settings(&settings) {
                eprintln!("{}", THEME.error_with_icon(&format!("{e:#}")));
                std::process::exit(ExitCode::GeneralError.into());
            }
            return;
        }
        _ => {}
    }

    let format = OutputFormat::from_json_flag(cli.command.wants_json());
    let started = Instant::now();

    let result = match CorpusStore::open(settings) {
        Ok(store) => run_command(Arc::new(store), cli.command, format, started).await,
        Err(e) => Err(e),
    };

    if let Err(error) = result {
        report_error(&error, format);
        std::process::exit(ExitCode::from_error(&error).into());
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` when settings ask for it.
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn init_project(force: bool) -> anyhow::Result<()> {
    let path = Settings::init_config_file(force)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("could not create settings file")?;

    println!(
        "{}",
        THEME.success_with_icon(&format!("Created configuration file at: {}", path.display()))
    );
    println!("Edit this file to customize your settings.");
    Ok(())
}

fn print_settings(settings: &Settings) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(settings).context("could not render settings")?;
    println!("{}", THEME.apply(&THEME.header, "Effective configuration"));
    println!("{rendered}");
    println!(
        "{} {}",
        THEME.apply(&THEME.dim, "Snapshot:"),
        THEME.apply(&THEME.path, settings.snapshot_path().display())
    );
    Ok(())
}

async fn run_command(
    store: Arc<CorpusStore>,
    command: Commands,
    format: OutputFormat,
    started: Instant,
) -> CorpusResult<()> {
    match command {
        Commands::Add {
            files,
            no_recompute,
            ..
        } => {
            let progress = (!format.is_json() && files.len() > 1)
                .then(|| create_progress_bar(files.len() as u64, "Adding papers"));

            let mut added = Vec::new();
            let mut failures = Vec::new();
            for path in &files {
                match store.add_file(path, false) {
                    Ok(id) => added.push(id),
                    // Every later file would fail the same way
                    Err(e) if e.is_retryable() => {
                        if let Some(pb) = &progress {
                            pb.finish_and_clear();
                        }
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::warn!("skipped {}: {e}", path.display());
                        failures.push(e);
                    }
                }
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            }
            if let Some(pb) = progress {
                pb.finish_and_clear();
            }

            // A single failed file is reported with its own exit code.
            if added.is_empty() && failures.len() == 1 {
                if let Some(error) = failures.pop() {
                    return Err(error);
                }
            }

            if !no_recompute && !added.is_empty() {
                recompute_with_spinner(Arc::clone(&store), format).await?;
            }

            if format.is_json() {
                let ids: Vec<&str> = added.iter().map(DocumentId::as_str).collect();
                emit_json(&ids, started);
            } else {
                for id in &added {
                    println!("{}", THEME.success_with_icon(&format!("Added {id}")));
                }
                if !failures.is_empty() {
                    println!(
                        "{}",
                        THEME.warning_with_icon(&format!("{} file(s) skipped", failures.len()))
                    );
                }
            }
        }

        Commands::Ingest { dir, .. } => {
            let dir = dir.unwrap_or_else(|| store.settings().inbox_dir());
            let spinner = (!format.is_json())
                .then(|| create_spinner(&format!("Ingesting {}", dir.display())));
            let ingest_store = Arc::clone(&store);
            let ingest_dir = dir.clone();
            let added =
                tokio::task::spawn_blocking(move || ingest_store.ingest_directory(&ingest_dir))
                    .await
                    .map_err(|e| CorpusError::TaskJoin(e.to_string()))?;
            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }
            let added = added?;

            if format.is_json() {
                emit_json(&serde_json::json!({ "added": added }), started);
            } else {
                println!(
                    "{}",
                    THEME.success_with_icon(&format!(
                        "Ingested {} new paper(s) from {}",
                        added,
                        dir.display()
                    ))
                );
            }
        }

        Commands::Analyze { .. } => {
            let spinner = (!format.is_json()).then(|| create_spinner("Analyzing corpus"));
            let analyze_store = Arc::clone(&store);
            let outcome = tokio::task::spawn_blocking(move || analyze_store.analyze())
                .await
                .map_err(|e| CorpusError::TaskJoin(e.to_string()));
            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }
            let outcome = outcome??;

            if format.is_json() {
                emit_json(&outcome.visualization, started);
            } else {
                println!("{}", create_recompute_table(&outcome.report));
                if outcome.report.documents == 0 {
                    println!("{}", THEME.apply(&THEME.dim, "The corpus is empty."));
                } else {
                    println!("{}", create_topics_table(&outcome.visualization));
                }
            }
        }

        Commands::Papers { .. } => {
            let documents = store.documents();
            if format.is_json() {
                emit_json(&documents, started);
            } else if documents.is_empty() {
                println!(
                    "{}",
                    THEME.apply(&THEME.dim, "No papers yet. Try 'scholarmap add <file>'.")
                );
            } else {
                println!("{}", create_documents_table(&documents));
                println!(
                    "{} paper(s)",
                    THEME.apply(&THEME.number, documents.len())
                );
            }
        }

        Commands::Show { id, .. } => {
            let id = DocumentId::new(id);
            let document = store.document(&id)?;
            if format.is_json() {
                emit_json(&document, started);
            } else {
                println!("{}", THEME.apply(&THEME.header, &document.display_title));
                println!("{}", THEME.topic_swatch(&document.color, &document.field));
                println!(
                    "{} {:.2}",
                    THEME.apply(&THEME.dim, "Confidence:"),
                    document.confidence
                );
                if !document.keywords.is_empty() {
                    println!(
                        "{} {}",
                        THEME.apply(&THEME.dim, "Keywords:"),
                        document.keywords.join(", ")
                    );
                }
                if let Some(path) = store.stored_file(&id) {
                    println!(
                        "{} {}",
                        THEME.apply(&THEME.dim, "File:"),
                        THEME.apply(&THEME.path, path.display())
                    );
                }
                if !document.abstract_text.is_empty() {
                    println!("\n{}", document.abstract_text);
                }
            }
        }

        Commands::Remove { id, no_recompute } => {
            let removed = store.remove_document(&DocumentId::new(id), !no_recompute)?;
            println!(
                "{}",
                THEME.success_with_icon(&format!("Removed {} ({})", removed.id, removed.filename))
            );
        }

        Commands::Edges { .. } => {
            let edges = store.similarity_edges();
            if format.is_json() {
                emit_json(&edges, started);
            } else if edges.is_empty() {
                println!(
                    "{}",
                    THEME.apply(&THEME.dim, "No edges above the similarity threshold.")
                );
            } else {
                println!("{}", create_edges_table(&edges));
            }
        }

        Commands::Init { .. } | Commands::Config => {}
    }

    Ok(())
}

async fn recompute_with_spinner(
    store: Arc<CorpusStore>,
    format: OutputFormat,
) -> CorpusResult<scholarmap::RecomputeReport> {
    let spinner = (!format.is_json()).then(|| create_spinner("Analyzing corpus"));
    let joined = store.recompute_in_background().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    joined.map_err(|e| CorpusError::TaskJoin(e.to_string()))?
}

fn emit_json<T: Serialize>(data: &T, started: Instant) {
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).ok();
    let response = JsonResponse::success(data).with_meta(ResponseMeta::now(elapsed_ms));
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("failed to serialize response: {e}"),
    }
}

fn report_error(error: &CorpusError, format: OutputFormat) {
    if format.is_json() {
        let response = JsonResponse::from_error(error);
        match serde_json::to_string_pretty(&response) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!("failed to serialize error response: {e}"),
        }
        return;
    }

    eprintln!("{}", THEME.error_with_icon(&error.to_string()));
    for suggestion in error.recovery_suggestions() {
        eprintln!("  {} {suggestion}", THEME.apply(&THEME.dim, "-"));
    }
}
