//! Storage abstractions for the listing service
//!
//! A `PropertyStore` reads the whole listings table and replaces it in full.
//! Backends: a local `.xlsx` workbook, a Google Sheets spreadsheet and an
//! in-process table.

use std::sync::Arc;

use async_trait::async_trait;
use configs::{StorageBackend, StorageConfig};
use models::Property;
use tracing::info;

use crate::errors::{ServiceError, StoreError};

pub mod google_auth;
pub mod memory;
pub mod sheets;
pub mod xlsx;

pub use memory::MemoryStore;
pub use sheets::SheetsStore;
pub use xlsx::XlsxStore;

/// Whole-table access to a tabular medium.
///
/// Ids are never persisted: `read_all` numbers rows by position and
/// `write_all` ignores the ids it is handed.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Make sure the header row is canonical. Backends without a header
    /// check keep the default no-op.
    async fn ensure_headers(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Every row in sheet order; an absent or empty medium yields no rows.
    async fn read_all(&self) -> Result<Vec<Property>, StoreError>;

    /// Replace the table with `properties`, headers preserved.
    async fn write_all(&self, properties: &[Property]) -> Result<(), StoreError>;
}

/// Build the configured backend.
pub fn open_store(cfg: &StorageConfig) -> Result<Arc<dyn PropertyStore>, ServiceError> {
    let store: Arc<dyn PropertyStore> = match cfg.backend {
        StorageBackend::Xlsx => Arc::new(XlsxStore::from_config(&cfg.xlsx)),
        StorageBackend::Sheets => Arc::new(
            SheetsStore::from_config(&cfg.sheets).map_err(|e| ServiceError::Config(e.to_string()))?,
        ),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(backend = store.backend(), "property store ready");
    Ok(store)
}
