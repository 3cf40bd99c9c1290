use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::ChvError;

const DEFAULT_FILTER: &str = "info";

/// Send traces to `path`. The terminal belongs to the UI, so nothing is logged without a file.
pub fn init(path: &Path) -> Result<(), ChvError> {
    let file = File::create(path).map_err(|source| ChvError::LogFile {
        path: path.to_path_buf(),
        source,
    })?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .with(ErrorLayer::default())
        .try_init()
    {
        eprintln!("Warning: Could not initialize logging: {e}");
    }
    Ok(())
}
