//! embedvault application binary - composition root.
//!
//! 1. Parse arguments and load configuration from TOML
//! 2. Install the tracing subscriber
//! 3. Run one subcommand and print to stdout. Record commands (`list`, `show`,
//!    `compare`, `clear`) work on the embedding directory alone; the rest
//!    build the provider and vector store through `EmbeddingManager`.

mod cli;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use embedvault_core::config::{EmbedVaultConfig, ProviderKind};
use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::CodeFragment;
use embedvault_storage::RecordInspector;
use embedvault_vector::EmbeddingManager;

use cli::{CliArgs, Command};

/// Characters of document text shown per search hit.
const SNIPPET_CHARS: usize = 200;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match EmbedVaultConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (EmbedVaultConfig::default(), Some(e)),
    };

    // Tracing.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match load_error {
        Some(e) if config_file.exists() => {
            tracing::warn!(
                path = %config_file.display(),
                error = %e,
                "Invalid config, using defaults"
            )
        }
        Some(_) => tracing::debug!(path = %config_file.display(), "No config file, using defaults"),
        None => tracing::debug!(path = %config_file.display(), "Configuration loaded"),
    }

    if let Some(dir) = &args.embedding_dir {
        config.embeddings.directory = dir.clone();
    }
    if args.mock {
        config.model.provider = ProviderKind::Mock;
    }

    match run(&args.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Command, config: &EmbedVaultConfig) -> Result<()> {
    match command {
        Command::List { scope } => {
            for path in record_inspector(config).list(*scope)? {
                println!("{}", path.display());
            }
        }
        Command::Show { record } => {
            let record = record_inspector(config).load(record)?;
            let meta = &record.metadata;
            println!("type:        {}", meta.kind);
            println!("timestamp:   {}", meta.timestamp.to_rfc3339());
            println!("model:       {}", meta.model);
            println!("dimensions:  {}", meta.dimensions);
            println!("norm:        {:.6}", meta.norm);
            println!("text_length: {}", meta.text_length);
            println!("word_count:  {}", meta.word_count);
            let head: Vec<String> = record
                .embedding
                .iter()
                .take(8)
                .map(|v| format!("{:.4}", v))
                .collect();
            println!("embedding:   [{}, ...]", head.join(", "));
            println!();
            println!("{}", record.text);
        }
        Command::Compare { a, b } => {
            let cmp = record_inspector(config).compare(a, b)?;
            println!("Text 1: {}", preview(&cmp.text_a));
            println!("Text 2: {}", preview(&cmp.text_b));
            println!(
                "Similarity: {:.4} ({:.2}%)",
                cmp.cosine_similarity,
                cmp.cosine_similarity * 100.0
            );
            println!("Euclidean distance: {:.4}", cmp.euclidean_distance);
        }
        Command::Clear { scope } => {
            let removed = record_inspector(config).clear(*scope)?;
            println!("Cleared {} saved embeddings", removed);
        }
        Command::Ingest {
            fragments,
            batch_size,
        } => {
            let manager = EmbeddingManager::from_config(config)?;
            let fragments = read_fragments(fragments)?;
            let report =
                manager.ingest(&fragments, batch_size.unwrap_or(config.store.batch_size))?;
            println!(
                "Ingested {} fragments in {} batches; collection now holds {} entries",
                report.fragments, report.batches, report.collection_count
            );
        }
        Command::Search { query, n_results } => {
            let manager = EmbeddingManager::from_config(config)?;
            let n = n_results.unwrap_or(config.search.default_limit);
            let results = manager.search(query, n)?;
            if results.is_empty() {
                println!("No results");
            }
            for (rank, r) in results.iter().enumerate() {
                println!(
                    "{}. {} (similarity {:.4}, distance {:.4})",
                    rank + 1,
                    r.id,
                    r.similarity,
                    r.distance
                );
                println!(
                    "   {} lines {}-{} {} {}",
                    r.meta("file_path"),
                    r.meta("start_line"),
                    r.meta("end_line"),
                    r.meta("class_name"),
                    r.meta("method_name")
                );
                let snippet: String = r.document.chars().take(SNIPPET_CHARS).collect();
                for line in snippet.lines() {
                    println!("   | {}", line);
                }
            }
        }
        Command::Export { output } => {
            let manager = EmbeddingManager::from_config(config)?;
            let path = manager.export_summary(output)?;
            println!("Exported summary to {}", path.display());
        }
        Command::Stats => {
            let manager = EmbeddingManager::from_config(config)?;
            let info = manager.model_info();
            let usage = manager.disk_usage()?;
            println!(
                "model:           {} ({} dimensions, max {} tokens)",
                info.name, info.dimensions, info.max_seq_length
            );
            println!(
                "collection:      {} ({} entries)",
                manager.store().name(),
                manager.count()?
            );
            println!("document files:  {}", usage.documents);
            println!("query files:     {}", usage.queries);
            println!(
                "disk usage:      {:.2} KB",
                usage.total_bytes as f64 / 1024.0
            );
        }
        Command::Count => {
            let manager = EmbeddingManager::from_config(config)?;
            println!("{}", manager.count()?);
        }
        Command::DropCollection => {
            let manager = EmbeddingManager::from_config(config)?;
            manager.drop_collection()?;
            println!("Deleted collection {}", manager.store().name());
        }
    }
    Ok(())
}

/// Record commands read the embedding directory only; they never load a
/// model or open the vector store.
fn record_inspector(config: &EmbedVaultConfig) -> RecordInspector {
    RecordInspector::new(&config.embeddings.directory)
}

fn read_fragments(path: &Path) -> Result<Vec<CodeFragment>> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        EmbedVaultError::Deserialization(format!(
            "Cannot read fragments from {}: {}",
            path.display(),
            e
        ))
    })
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(60).collect();
    if head.len() < text.len() {
        format!("{}...", head)
    } else {
        head
    }
}
