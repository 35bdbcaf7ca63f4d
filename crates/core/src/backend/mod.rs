pub mod error;
pub mod http;

use crate::domain::asset::AssetClass;
use crate::domain::indices::ReferenceIndex;
use crate::domain::radar::RadarRecord;
use anyhow::Result;

pub use error::BackendError;
pub use http::HttpBackend;

/// Which tickers belong to which category.
#[async_trait::async_trait]
pub trait InventoryClient: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<String>>;

    /// Ordered tickers of one category. An empty list is a valid answer; an unknown category
    /// fails with [`BackendError::NotFound`].
    async fn list_tickers(&self, category: &str) -> Result<Vec<String>>;
}

/// Per-ticker valuation snapshot.
#[async_trait::async_trait]
pub trait ValuationClient: Send + Sync {
    async fn fetch_valuation(&self, class: AssetClass, ticker: &str) -> Result<RadarRecord>;
}

/// Macro benchmarks. `force` bypasses the backend cache.
#[async_trait::async_trait]
pub trait IndicesClient: Send + Sync {
    async fn fetch_reference_indices(&self, force: bool) -> Result<ReferenceIndex>;
}
