//! PDF Cover Splitter - Entry point
//!
//! MCP server over stdio. Any command-line arguments are taken as resource
//! directories that input and output paths must stay within.

use pdf_cover_splitter::run_server_with_dirs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP transport, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_cover_splitter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let resource_dirs: Vec<String> = std::env::args().skip(1).collect();
    tracing::info!(?resource_dirs, "Starting PDF cover splitter");

    run_server_with_dirs(resource_dirs).await
}
