//! Service layer for the listings catalogue.
//! - `storage` reads and rewrites the whole listings table on a backing medium.
//! - `listing` implements list/create/update/delete on top of a store.
//! - `errors` separates store failures from service outcomes.

pub mod errors;
pub mod listing;
pub mod runtime;
pub mod storage;
#[cfg(test)]
pub mod test_support;

pub use listing::{ListingService, Summary};
