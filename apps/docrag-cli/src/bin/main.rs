use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use docrag_core::config::{Config, Settings};
use docrag_pipeline::{IndexBuilder, IndexGuard, QueryEngine};
use docrag_server::AppState;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "docrag", about = "Markdown semantic search: index, query, serve")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding config.toml / config.<env>.toml.
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the collection from the documents directory.
    Index {
        #[arg(long)]
        docs: Option<PathBuf>,
    },
    /// Run one query against the collection.
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Start the HTTP server.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_thread_ids(false).with_ansi(true))
            .init();
    }
}

fn spinner(msg: &'static str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

async fn run_index(settings: &Settings) -> anyhow::Result<()> {
    let embedder = docrag_embed::load_embedder(&settings.embedding)?;
    let store = docrag_vector::open_store(&settings.store).await?;
    let builder = IndexBuilder::new(settings, embedder, store, IndexGuard::new())?;

    println!("Indexing {} into '{}'", settings.docs.root.display(), builder.collection());
    let pb = spinner("embedding documents")?;
    let result = builder.build().await;
    pb.finish_and_clear();
    let report = result?;

    println!("✅ Indexed {} documents into {} points ({} ms)", report.documents, report.points, report.elapsed_ms);
    Ok(())
}

async fn run_search(settings: &Settings, query: &str, limit: Option<usize>) -> anyhow::Result<()> {
    let embedder = docrag_embed::load_embedder(&settings.embedding)?;
    let store = docrag_vector::open_store(&settings.store).await?;
    let engine = QueryEngine::new(settings, Some(embedder), Some(store), IndexGuard::new());

    let results = engine.search(query, limit).await?;
    if results.is_empty() {
        println!("No results for '{query}'");
        return Ok(());
    }
    for (rank, r) in results.iter().enumerate() {
        println!("{}. [{:.4}] {} ({})", rank + 1, r.score, r.title, r.filename);
        let preview: String = r.content.chars().take(200).collect();
        println!("   {preview}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = Config::load_from(&cli.config_dir)?;
    let mut settings = config.settings()?;
    info!(env = config.env_name(), version = env!("CARGO_PKG_VERSION"), "docrag starting");

    match cli.command {
        Commands::Index { docs } => {
            if let Some(docs) = docs {
                settings.docs.root = docs;
            }
            run_index(&settings).await
        }
        Commands::Search { query, limit } => run_search(&settings, &query, limit).await,
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            let state = AppState::initialize(&settings).await;
            docrag_server::serve(&settings, state).await
        }
    }
}
