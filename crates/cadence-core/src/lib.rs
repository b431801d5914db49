pub mod backoff;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod disambiguate;
pub mod enrich;
pub mod error;
pub mod executor;
pub mod models;
pub mod throttle;
pub mod traits;
pub mod warnings;

#[cfg(test)]
pub mod testutil;

pub use backoff::BackoffPolicy;
pub use cache::{CacheStats, MetadataCache};
pub use catalog::{CatalogService, ReleaseGroupDetails};
pub use config::CatalogConfig;
pub use enrich::{ConcurrentEnricher, EnrichReport};
pub use error::{AppError, TransportError};
pub use executor::{ExecutorConfig, RequestDescriptor, RequestExecutor};
pub use models::{Recording, Release, ReleaseGroupSlot, ReleaseKind, SearchKind};
pub use throttle::{RateLimitConfig, RateLimiter, ThrottleConfig};
pub use traits::{DetailFetcher, HttpRequest, HttpResponse, Method, Transport};
pub use warnings::{Warning, WarningCollector, WarningKind};
