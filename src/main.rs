mod config;

use anyhow::Result;
use clap::Parser;

// Keeps memory flat across long crawls with many short-lived allocations.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Crawls a single origin, extracting e-mail addresses and phone numbers.
#[derive(Parser)]
#[command(name = "sitecrawl", about = "Single-origin contact-information crawler")]
struct Cli {
    /// Seed URL to crawl (must be http/https).
    start_url: String,

    /// Path to a TOML config file; falls back to the bundled defaults.
    #[arg(short, long)]
    config: Option<String>,

    /// Include the run's diagnostics object in the printed result.
    #[arg(long)]
    diagnostics: bool,
}

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase())),
        )
        .init();

    let result = sitecrawl_engine::parse(&cli.start_url, &config, cli.diagnostics).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
