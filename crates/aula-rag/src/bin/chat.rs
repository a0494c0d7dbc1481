//! Interactive chat binary
//!
//! Run with: cargo run -p aula-rag --bin aula-chat -- --source-dir ./data

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use futures_util::StreamExt;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aula_rag::{AssistantConfig, AssistantService};

#[derive(Parser)]
#[command(name = "aula-chat", about = "Chat with your course material")]
struct Args {
    /// Directory with course documents (overrides ASSISTANT_SOURCE_DIR)
    #[arg(long)]
    source_dir: Option<PathBuf>,
    /// Directory for the index snapshot and ledger (overrides ASSISTANT_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Print answers whole instead of streaming tokens
    #[arg(long)]
    no_stream: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aula_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = AssistantConfig::from_env()?;
    if let Some(dir) = args.source_dir {
        config.ingestion.source_dir = dir;
    }
    if let Some(dir) = args.data_dir {
        config.ingestion.data_dir = dir;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Provider: {}", config.provider.kind);
    tracing::info!("  - Answer model: {}", config.provider.answer_model);
    tracing::info!(
        "  - Embedding model: {} ({} dims)",
        config.provider.embed_model,
        config.provider.dimensions
    );
    tracing::info!("  - Source dir: {}", config.ingestion.source_dir.display());
    tracing::info!("  - Data dir: {}", config.ingestion.data_dir.display());

    let service = AssistantService::new(config)?;

    let provider_name = service.embedding_provider().name().to_string();
    match service.embedding_provider().health_check().await {
        Ok(true) => tracing::info!("{provider_name} provider is reachable"),
        _ => tracing::warn!(
            "{provider_name} provider is not reachable; ingestion and answers will fail until it is"
        ),
    }

    // Queries answer "not ready" until the background run completes
    let _ingestion = service.spawn_ingestion();

    println!("Escribe tu pregunta (o 'salir' para terminar).");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "salir" | "exit" | "quit") {
            break;
        }

        if args.no_stream {
            println!("{}", service.answer(question).await);
        } else {
            let mut stream = service.answer_stream(question);
            while let Some(token) = stream.next().await {
                print!("{token}");
                std::io::stdout().flush()?;
            }
            println!();
        }
    }

    Ok(())
}
