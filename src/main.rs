//! GeoCapture maintenance tool.
//!
//! Opens the measurement store, finishes measurements a crashed capture
//! process left behind and prints a JSON summary of every measurement.

use anyhow::Context;
use geocapture::storage::config::load_config;
use geocapture::storage::SensorFileStore;
use geocapture::{Database, PersistenceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting GeoCapture v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("Failed to load configuration")?;
    let database_path = config.database_path();
    let database = Database::open(&database_path)
        .with_context(|| format!("Failed to open {}", database_path.display()))?
        .with_sensor_files(SensorFileStore::new(config.sensor_data_dir()));
    let persistence = PersistenceLayer::from_config(database, &config);

    let recovered = persistence.recover_dangling_measurements()?;
    if !recovered.is_empty() {
        tracing::warn!("Finished {} dangling measurements", recovered.len());
    }

    let mut summaries = Vec::new();
    for measurement in persistence.load_measurements()? {
        match persistence.summarize(measurement.id) {
            Ok(summary) => summaries.push(summary),
            Err(e) => tracing::error!("Skipping measurement {}: {}", measurement.id, e),
        }
    }

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
