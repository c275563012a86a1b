//! # Grounding CLI (`gnd`)
//!
//! Drives the contribution engine from the command line: database
//! initialization, contribution CRUD, and retrieval.
//!
//! ```bash
//! gnd --config ./config/gnd.toml init
//! gnd add --kind doc --author 7 --domain health --text "…"
//! gnd list --author 7
//! gnd update 3 --author 7 --text "…"
//! gnd retrieve "sleep quality" "exercise" --top-k 4 --domain health
//! gnd delete 3 --author 7
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grounding::config::{self, Config};
use grounding::embedding::create_client;
use grounding::service::ContributionService;
use grounding::sqlite_store::{SqliteDocumentRepository, SqliteVectorStore};
use grounding::{db, migrate};

use grounding_core::models::{
    ContentKind, DocumentPatch, ExtraMap, ExtraValue, Language, NewDocument, Visibility,
};
use grounding_core::store::ChunkFilter;
use grounding_core::Error;

#[derive(Parser)]
#[command(
    name = "gnd",
    about = "Grounding — a contribution ingestion and retrieval engine for LLM persona generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gnd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema (idempotent).
    Init,

    /// Ingest a new contribution.
    Add {
        /// Contribution text; use `--file` to read it from disk instead.
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// Read the contribution text from this file.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Content kind: survey, interview, review, or doc.
        #[arg(long)]
        kind: String,
        /// Author id; omit for an anonymous contribution.
        #[arg(long)]
        author: Option<i64>,
        #[arg(long)]
        domain: Option<String>,
        /// Language: en or id.
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        source: Option<String>,
        /// Visibility: public or private (default private).
        #[arg(long)]
        visibility: Option<String>,
        /// Free-form metadata as key=value, repeatable.
        #[arg(long = "extra", value_name = "KEY=VALUE")]
        extra: Vec<String>,
    },

    /// List your contributions (cursor-paginated).
    List {
        #[arg(long)]
        author: i64,
        #[arg(long)]
        limit: Option<i64>,
        /// Last-seen id from the previous page.
        #[arg(long)]
        cursor: Option<i64>,
    },

    /// Show one contribution.
    Get {
        id: i64,
        #[arg(long)]
        author: i64,
    },

    /// Edit a contribution and re-index it.
    Update {
        id: i64,
        #[arg(long)]
        author: i64,
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        visibility: Option<String>,
    },

    /// Remove a contribution and its index entries.
    Delete {
        id: i64,
        #[arg(long)]
        author: i64,
    },

    /// Similarity-search stored chunks for grounding context.
    Retrieve {
        /// Query terms, joined into one similarity query.
        terms: Vec<String>,
        /// Result count; 0 skips retrieval entirely.
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        language: Option<String>,
        /// Restrict to chunks contributed by this author.
        #[arg(long)]
        author: Option<i64>,
    },
}

type SqliteService = ContributionService<SqliteDocumentRepository, SqliteVectorStore>;

async fn open_service(config: &Config) -> Result<SqliteService> {
    let pool = db::connect(&config.db.path).await?;
    let embedder = create_client(&config.embedding)?;
    let repo = SqliteDocumentRepository::new(pool.clone());
    let vectors = SqliteVectorStore::new(pool, embedder);
    Ok(ContributionService::new(
        repo,
        vectors,
        config.chunking.splitter(),
    ))
}

fn parse_extra(pairs: &[String]) -> Result<ExtraMap> {
    let mut extra = ExtraMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("--extra '{pair}' is not of the form key=value"))?;
        extra.insert(key.to_string(), ExtraValue::String(value.to_string()));
    }
    Ok(extra)
}

fn read_text(text: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    match (text, file) {
        (Some(text), _) => Ok(Some(text)),
        (None, Some(path)) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(content))
        }
        (None, None) => Ok(None),
    }
}

fn print_document(doc: &grounding_core::models::Document) {
    println!("document {}", doc.id);
    println!("  kind: {}", doc.kind);
    if let Some(domain) = &doc.domain_key {
        println!("  domain: {domain}");
    }
    if let Some(language) = doc.language {
        println!("  language: {language}");
    }
    if let Some(source) = &doc.source {
        println!("  source: {source}");
    }
    println!("  visibility: {}", doc.visibility);
    println!("  updated: {}", format_ts_iso(doc.updated_at));
    let preview: String = doc.text.chars().take(160).collect();
    println!("  text: {preview}");
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("initialized {}", config.db.path.display());
        }

        Commands::Add {
            text,
            file,
            kind,
            author,
            domain,
            language,
            source,
            visibility,
            extra,
        } => {
            let text = read_text(text, file)?
                .context("provide the contribution text via --text or --file")?;
            let mut payload = NewDocument::new(text, ContentKind::from_str(&kind)?);
            payload.author_id = author;
            payload.domain_key = domain;
            payload.language = language.as_deref().map(Language::from_str).transpose()?;
            payload.source = source;
            if let Some(visibility) = visibility.as_deref() {
                payload.visibility = Visibility::from_str(visibility)?;
            }
            payload.extra = parse_extra(&extra)?;

            let service = open_service(&config).await?;
            let receipt = service.create(payload).await?;
            println!("created document {} ({} chunks)", receipt.id, receipt.chunks);
        }

        Commands::List {
            author,
            limit,
            cursor,
        } => {
            let service = open_service(&config).await?;
            let page = service.list(author, limit, cursor).await?;
            for doc in &page.items {
                println!(
                    "{:>6}  {:<10} {}",
                    doc.id,
                    doc.kind,
                    format_ts_iso(doc.updated_at)
                );
            }
            match page.next_cursor {
                Some(cursor) => println!("next cursor: {cursor}"),
                None => println!("end of results"),
            }
        }

        Commands::Get { id, author } => {
            let service = open_service(&config).await?;
            match service.get(author, id).await {
                Ok(doc) => print_document(&doc),
                Err(Error::NotFound) => {
                    println!("document {id} not found");
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Commands::Update {
            id,
            author,
            text,
            file,
            kind,
            domain,
            language,
            source,
            visibility,
        } => {
            let patch = DocumentPatch {
                text: read_text(text, file)?,
                kind: kind.as_deref().map(ContentKind::from_str).transpose()?,
                domain_key: domain,
                language: language.as_deref().map(Language::from_str).transpose()?,
                source,
                extra: None,
                visibility: visibility.as_deref().map(Visibility::from_str).transpose()?,
            };

            let service = open_service(&config).await?;
            let receipt = service.update(author, id, patch).await?;
            println!("updated document {} ({} chunks)", receipt.id, receipt.chunks);
        }

        Commands::Delete { id, author } => {
            let service = open_service(&config).await?;
            let id = service.delete(author, id).await?;
            println!("deleted document {id}");
        }

        Commands::Retrieve {
            terms,
            top_k,
            domain,
            language,
            author,
        } => {
            let filter = ChunkFilter {
                domain_key: domain,
                language: language.as_deref().map(Language::from_str).transpose()?,
                author_id: author,
            };
            let top_k = top_k.unwrap_or(config.retrieval.top_k);

            let service = open_service(&config).await?;
            let results = service.retrieve(&terms, top_k, &filter).await?;
            if results.is_empty() {
                println!("no matching chunks");
            }
            for chunk in &results {
                let preview: String = chunk.content.chars().take(120).collect();
                println!(
                    "{:.4}  doc {} chunk {}  {}",
                    chunk.score, chunk.doc_id, chunk.chunk_index, preview
                );
            }
        }
    }

    Ok(())
}
