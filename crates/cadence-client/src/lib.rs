pub mod transport;

pub use transport::ReqwestTransport;

use cadence_core::{AppError, CatalogConfig, CatalogService, RequestExecutor};

/// Build a catalog service talking HTTP with the given configuration.
pub fn catalog_service(config: &CatalogConfig) -> Result<CatalogService<ReqwestTransport>, AppError> {
    let executor = RequestExecutor::new(ReqwestTransport::new()?, config.executor.clone())?;
    Ok(CatalogService::new(executor))
}
