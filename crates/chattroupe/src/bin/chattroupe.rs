//! Interactive terminal client
//!
//! Run with: cargo run -p chattroupe --bin chattroupe

use chattroupe::{repl::Repl, AppConfig, Assistant, Session};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chattroupe", version, about = "Chat with PDFs, images and Gemini")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the embedding index
    #[arg(long)]
    index_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with replies
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chattroupe=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(path) = args.index_path {
        config.index.path = path;
    }

    let assistant = Assistant::from_config(&config)?;
    let session = Session::new(config.index.path.clone());

    tracing::info!("Index directory: {}", config.index.path.display());

    Repl::new(assistant, session).run().await?;

    Ok(())
}
