//! Rebuild the strain embedding index from the command line.
//!
//! Same pipeline as `GET /strains/embed-strains`, with a progress bar.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::sync::Arc;
use strain_catalog_api::{
    ml::OpenAiClient,
    services::{EmbeddingIndexBuilder, IndexStore, PgCatalog},
    Config, Result,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strain_catalog_api=warn,embed_strains=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    info!("Writing embedding index to {}", config.index_path.display());

    let catalog = PgCatalog::connect(&config.database_url, config.database_max_connections).await?;
    let embedder = OpenAiClient::from_config(&config)?;

    let builder = EmbeddingIndexBuilder::new(
        Arc::new(catalog),
        Arc::new(embedder),
        IndexStore::new(&config.index_path),
        config.embed_delay(),
    );

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .progress_chars("#>-"),
    );

    let report = builder.build(&progress).await?;

    println!(
        "{} {} of {} strains embedded into {}",
        style("✔").green().bold(),
        style(report.embedded).bold(),
        report.total,
        config.index_path.display()
    );
    if report.skipped > 0 {
        println!(
            "{} {} incomplete strains skipped",
            style("!").yellow().bold(),
            report.skipped
        );
    }
    if report.failed > 0 {
        println!(
            "{} {} strains failed to embed; re-run to retry them",
            style("✘").red().bold(),
            report.failed
        );
    }

    Ok(())
}
