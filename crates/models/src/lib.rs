//! Listing data model shared by the storage backends and the HTTP layer.
//! - `Property` is one spreadsheet row plus its positional id.
//! - `columns` fixes the header sequence every backend reads and writes.
//! - `cell` converts between loosely typed spreadsheet cells and typed fields.

pub mod cell;
pub mod columns;
pub mod errors;
pub mod property;

pub use cell::CellValue;
pub use columns::{column_letter, Column, ColumnLayout};
pub use errors::ModelError;
pub use property::{Property, PropertyData, YesNo};
