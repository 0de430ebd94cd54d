//! seo-rag CLI
//!
//! Runs Analyze or Chat against an analysis document stored as JSON.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use seo_rag::metrics::RAG_METRICS;
use seo_rag::{ChatTurn, ConfigOverrides, RagPipeline};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seo-rag", version, about = "Grounded LLM explanations for SEO analysis results")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce a structured explanation of an analysis document
    Analyze {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Ask a follow-up question about an analysis document
    Chat {
        #[command(flatten)]
        common: CommonArgs,

        /// The new user message
        #[arg(short, long)]
        message: String,

        /// Earlier turns as a JSON array of {role, content}
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Analysis document produced by the page analyzer
    #[arg(short, long)]
    input: PathBuf,

    /// Chat provider: openai, ollama or gemini
    #[arg(long)]
    provider: Option<String>,

    /// Embedding backend: openai, local or ollama
    #[arg(long)]
    embedding_backend: Option<String>,

    /// Skip knowledge retrieval
    #[arg(long)]
    no_rag: bool,

    /// Passages to retrieve (clamped to 1-16)
    #[arg(long)]
    max_passages: Option<i64>,
}

impl CommonArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            llm_provider: self.provider.clone(),
            embedding_backend: self.embedding_backend.clone(),
            use_rag: self.no_rag.then_some(false),
            max_passages: self.max_passages,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let result = run(cli.command).await;

    if cli.print_metrics {
        eprintln!("{}", RAG_METRICS.gather_text());
    }
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(command: Command) -> Result<()> {
    let pipeline = RagPipeline::from_env().context("Failed to load configuration")?;

    match command {
        Command::Analyze { common } => {
            let document = read_json(&common.input)?;
            let result = pipeline.analyze(&document, &common.overrides()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Chat {
            common,
            message,
            history,
        } => {
            let document = read_json(&common.input)?;
            let mut turns: Vec<ChatTurn> = match history {
                Some(path) => serde_json::from_value(read_json(&path)?)
                    .with_context(|| format!("Invalid chat history in {}", path.display()))?,
                None => Vec::new(),
            };
            turns.push(ChatTurn::user(message));

            let reply = pipeline.chat(&document, &turns, &common.overrides()).await?;
            println!("{}", reply);
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}
