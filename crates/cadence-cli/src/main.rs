use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cadence_client::{ReqwestTransport, catalog_service};
use cadence_core::{CatalogConfig, CatalogService};

#[derive(Parser)]
#[command(name = "cadence", version, about = "Resilient music catalog lookups")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the release that best matches an album
    Release {
        /// Artist name as it appears in tags
        #[arg(short, long)]
        artist: String,

        /// Album title
        #[arg(short = 'l', long)]
        album: String,

        /// Number of tracks on the local copy
        #[arg(short, long, default_value_t = 12)]
        tracks: usize,

        /// Resolve through this barcode before searching
        #[arg(short, long)]
        barcode: Option<String>,
    },

    /// Find a recording by artist and title
    Recording {
        #[arg(short, long)]
        artist: String,

        #[arg(short, long)]
        title: String,
    },

    /// List and classify an artist's release groups
    Discography {
        /// Catalog identifier of the artist
        #[arg(long)]
        artist_id: String,

        /// Artist name used in warnings
        #[arg(short, long)]
        artist: String,

        /// Concurrent detail lookups (1-10, defaults to CADENCE_PARALLELISM)
        #[arg(short, long)]
        parallelism: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cadence=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = CatalogConfig::from_env().context("Invalid catalog configuration")?;
    let catalog = catalog_service(&config).context("Failed to create catalog client")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling outstanding lookups");
            on_signal.cancel();
        }
    });

    let result = match cli.command {
        Commands::Release {
            artist,
            album,
            tracks,
            barcode,
        } => cmd_release(&catalog, &cancel, &artist, &album, tracks, barcode.as_deref()).await,
        Commands::Recording { artist, title } => {
            cmd_recording(&catalog, &cancel, &artist, &title).await
        }
        Commands::Discography {
            artist_id,
            artist,
            parallelism,
        } => {
            let parallelism = parallelism.unwrap_or(config.parallelism);
            cmd_discography(&catalog, &cancel, &artist_id, &artist, parallelism).await
        }
    };

    for warning in catalog.warnings().warnings() {
        tracing::warn!(
            kind = %warning.kind,
            context = %warning.context,
            "{}",
            warning.details
        );
    }

    result
}

async fn cmd_release(
    catalog: &CatalogService<ReqwestTransport>,
    cancel: &CancellationToken,
    artist: &str,
    album: &str,
    tracks: usize,
    barcode: Option<&str>,
) -> Result<()> {
    if let Some(barcode) = barcode {
        match catalog
            .resolve_release_by_barcode(cancel, artist, album, barcode)
            .await?
        {
            Some(id) => tracing::info!(%id, barcode, "Resolved release by barcode"),
            None => tracing::info!(barcode, "Barcode unknown, falling back to search"),
        }
    }

    let release = catalog
        .find_release(cancel, artist, album, tracks)
        .await
        .with_context(|| format!("No release found for {artist} - {album}"))?;

    println!("{}", serde_json::to_string_pretty(&release)?);
    Ok(())
}

async fn cmd_recording(
    catalog: &CatalogService<ReqwestTransport>,
    cancel: &CancellationToken,
    artist: &str,
    title: &str,
) -> Result<()> {
    let recording = catalog
        .find_recording(cancel, artist, title)
        .await
        .with_context(|| format!("No recording found for {artist} - {title}"))?;

    println!("{}", serde_json::to_string_pretty(&recording)?);
    Ok(())
}

async fn cmd_discography(
    catalog: &CatalogService<ReqwestTransport>,
    cancel: &CancellationToken,
    artist_id: &str,
    artist: &str,
    parallelism: usize,
) -> Result<()> {
    let mut slots = catalog
        .artist_release_groups(cancel, artist_id)
        .await
        .with_context(|| format!("Failed to list release groups for {artist}"))?;

    tracing::info!(groups = slots.len(), parallelism, "Enriching discography");
    let report = catalog
        .enrich_discography(cancel, artist, &mut slots, parallelism)
        .await;

    tracing::info!(
        succeeded = report.succeeded,
        fell_back = report.fell_back,
        skipped = report.skipped,
        "Discography ready"
    );

    println!("{}", serde_json::to_string_pretty(&slots)?);
    Ok(())
}
