use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use models::{Property, PropertyData};
use tokio::sync::RwLock;

use super::PropertyStore;
use crate::errors::StoreError;

/// In-process listings table. Nothing survives a restart.
///
/// Reads and writes can be made to fail on demand, which is how the
/// service's error paths are exercised.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<PropertyData>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<PropertyData>) -> Self {
        Self { rows: RwLock::new(rows), ..Self::default() }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `write_all` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current rows, bypassing injected failures.
    pub async fn rows(&self) -> Vec<PropertyData> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn read_all(&self) -> Result<Vec<Property>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Injected("read".into()));
        }
        let rows = self.rows.read().await;
        Ok(Property::enumerate(rows.iter().cloned()))
    }

    async fn write_all(&self, properties: &[Property]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Injected("write".into()));
        }
        let mut rows = self.rows.write().await;
        *rows = properties.iter().map(|p| p.data.clone()).collect();
        drop(rows);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
