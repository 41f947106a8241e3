use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use fopgate::api::{self, AppState};
use fopgate::config::Config;
use fopgate::convert::Converter;
use fopgate::fetch::ResourceFetcher;
use fopgate::handlers::{HandlerServices, JobRegistry};
use fopgate::storage::StorageClient;
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Loads configuration, builds the registry and serves until shutdown.
///
/// Any configuration or handler initialisation failure aborts startup.
pub async fn run(address: Option<SocketAddr>, config_path: Option<PathBuf>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    info!(provider = ?config.storage.provider, "Opening storage");
    let storage = StorageClient::from_config(&config.storage)?;
    let fetcher = ResourceFetcher::new(&config.fetch)?;

    let services = HandlerServices {
        storage,
        fetcher: Arc::new(fetcher),
        converter: Converter::new(),
    };
    let registry = JobRegistry::with_builtins(
        config.server.operation_prefix.clone(),
        &services,
        &config.handlers,
    )?;

    let address = address.unwrap_or(config.server.bind_addr);
    api::run(address, AppState::new(config, registry)).await
}
