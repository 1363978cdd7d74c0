use std::sync::Arc;

use models::PropertyData;

use crate::listing::ListingService;
use crate::storage::MemoryStore;

pub fn listing(zona: &str) -> PropertyData {
    PropertyData {
        zona: zona.into(),
        descripcion: format!("depto en {zona}"),
        ambientes: 2,
        precio: 90000.0,
        metros_cubiertos: 45.0,
        ..PropertyData::default()
    }
}

/// A service over an in-memory table seeded with `rows`.
pub fn service_with(rows: Vec<PropertyData>) -> (ListingService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_rows(rows));
    (ListingService::new(store.clone()), store)
}
