//! The `fetch` command: retrieve one satellite image to a file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Args;
use tracing::info;

use firesight::{
    FetchConfig, FetchOrchestrator, HttpImageFetcher, ImageRequest, LayerCatalog, ReqwestClient,
    Satellite,
};

use crate::commands::common::{cache_config, open_cache};
use crate::error::CliError;

/// Arguments for the `fetch` command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Satellite constellation (MODIS, VIIRS or GOES)
    #[arg(long)]
    pub satellite: String,

    /// Product identifier (e.g. MOD09GA)
    #[arg(long)]
    pub product: String,

    /// Acquisition date, YYYY-MM-DD
    #[arg(long)]
    pub date: String,

    /// Latitude of the point of interest, degrees north
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the point of interest, degrees east
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Search radius around the point, kilometres
    #[arg(long, default_value_t = 50.0)]
    pub radius: f64,

    /// Path to write the fetched image to
    #[arg(long, short)]
    pub output: PathBuf,

    /// Layer catalog JSON file (defaults to the built-in catalog)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Cache directory (defaults to the user cache dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Cache size bound in MiB
    #[arg(long)]
    pub cache_max_mb: Option<u64>,
}

/// Run the fetch command.
pub async fn run(args: FetchArgs) -> Result<(), CliError> {
    let satellite: Satellite = args
        .satellite
        .parse()
        .map_err(|e: firesight::InvalidRequestError| CliError::InvalidRequest(e.to_string()))?;
    let date = NaiveDate::parse_from_str(&args.date, "%Y-%m-%d")
        .map_err(|e| CliError::InvalidRequest(format!("bad date '{}': {}", args.date, e)))?;
    let request = ImageRequest::new(satellite, &args.product, date, args.lat, args.lon, args.radius)
        .map_err(|e| CliError::InvalidRequest(e.to_string()))?;

    let catalog = load_catalog(args.catalog.as_deref())?;

    let cache_config = cache_config(args.cache_dir, args.cache_max_mb);
    let cache = Arc::new(open_cache(&cache_config).await?);

    let fetch_config = FetchConfig::default();
    let client = ReqwestClient::new(fetch_config.fetch_timeout)
        .map_err(|e| CliError::Client(e.to_string()))?;
    let fetcher = Arc::new(HttpImageFetcher::new(client, fetch_config.fetch_timeout));

    let orchestrator = FetchOrchestrator::new(catalog, cache, fetcher, &fetch_config);

    info!(
        satellite = %request.satellite(),
        product = %request.product(),
        date = %request.date(),
        lat = request.latitude(),
        lon = request.longitude(),
        "fetching image"
    );

    let payload = orchestrator.fetch_image(&request).await?;

    tokio::fs::write(&args.output, &payload)
        .await
        .map_err(|e| CliError::Output(format!("{}: {}", args.output.display(), e)))?;

    println!(
        "Wrote {} bytes to {}",
        payload.len(),
        args.output.display()
    );
    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<LayerCatalog, CliError> {
    match path {
        Some(path) => LayerCatalog::from_json(path).map_err(|e| CliError::Catalog(e.to_string())),
        None => Ok(LayerCatalog::builtin()),
    }
}
