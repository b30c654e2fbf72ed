//! ChatTroupe server binary
//!
//! Run with: cargo run -p chattroupe --bin chattroupe-server

use chattroupe::{AppConfig, ChatServer};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chattroupe-server", version, about = "ChatTroupe HTTP API")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chattroupe=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                        ChatTroupe                         ║
║          PDF Q&A, Image Q&A and Chat over Gemini          ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.gemini.embedding_model);
    tracing::info!("  - Q&A model: {}", config.gemini.qa_model);
    tracing::info!("  - Chat model: {}", config.gemini.chat_model);
    tracing::info!("  - Vision model: {}", config.gemini.vision_model);
    tracing::info!("  - Chunk size: {}", config.chunking.chunk_size);

    let server = ChatServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/sessions                     - Start a session");
    println!("  POST /api/sessions/:id/documents       - Submit & Process PDFs");
    println!("  POST /api/sessions/:id/pdf/ask         - Ask about the PDFs");
    println!("  PUT  /api/sessions/:id/image           - Upload an image");
    println!("  POST /api/sessions/:id/image/ask       - Ask about the image");
    println!("  POST /api/sessions/:id/chat            - Chat (SSE stream)");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
