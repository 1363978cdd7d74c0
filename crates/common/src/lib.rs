//! Shared helpers used by every crate in the workspace: logging setup,
//! startup directory checks and small response types.

pub mod env;
pub mod types;
pub mod utils;
