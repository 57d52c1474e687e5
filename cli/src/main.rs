//! `resume-match`: ingest resumes and rank them against a job description.
//!
//! # Commands
//!
//! - `ingest <FILE>`: extract, embed and store a PDF or DOCX resume
//! - `search <QUERY>...`: rank stored resumes by semantic similarity
//! - `list`: show stored resumes
//! - `show <ID>`: print one resume's extracted text
//!
//! Settings come from the environment (and a `.env` file when present).

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use resume_documents::Candidate;
use resume_ranking::{MatchConfig, RankingError, SearchService};

mod output;

/// Semantic resume search
#[derive(Parser)]
#[command(name = "resume-match")]
#[command(version)]
#[command(about = "Rank resumes against a job description by meaning, not keywords")]
#[command(propagate_version = true)]
struct Cli {
    /// Document store directory (overrides RESUME_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a PDF or DOCX resume
    Ingest {
        /// Resume file
        file: PathBuf,

        /// Candidate name
        #[arg(long)]
        name: Option<String>,

        /// Candidate email
        #[arg(long)]
        email: Option<String>,
    },
    /// Rank stored resumes against a job description
    Search {
        /// Job description or keywords
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Only show the best N matches
        #[arg(long, short = 'k')]
        top_k: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored resumes
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one stored resume
    Show {
        /// Resume identifier
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine.
    let dotenv = dotenvy::dotenv();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    if let Ok(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let mut config = MatchConfig::from_env().context("invalid configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let service = SearchService::open(config)
        .await
        .context("failed to open the resume store")?;

    match cli.command {
        Commands::Ingest { file, name, email } => {
            let candidate = Candidate::new(non_blank(name), non_blank(email));
            let document = service
                .ingest_file(&file, candidate)
                .await
                .with_context(|| format!("failed to ingest {}", file.display()))?;
            println!("{}", output::ingested(&document));
        }
        Commands::Search { query, top_k, json } => {
            let query = query.join(" ");
            let report = match service.search(&query, top_k).await {
                Ok(report) => report,
                Err(RankingError::SearchUnavailable(e)) => {
                    bail!("search temporarily unavailable: {e}")
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(degraded) = &report.degraded {
                eprintln!(
                    "warning: {} resumes could not be embedded and were scored 0 ({})",
                    degraded.documents, degraded.reason
                );
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", output::search_report(&report));
            }
        }
        Commands::List { json } => {
            let documents = service.list().await?;
            if json {
                let rows: Vec<output::Listing<'_>> =
                    documents.iter().map(output::Listing::from).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{}", output::document_list(&documents));
            }
        }
        Commands::Show { id } => match service.get(&id).await? {
            Some(document) => print!("{}", output::document_detail(&document)),
            None => bail!("resume not found: {id}"),
        },
    }

    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
