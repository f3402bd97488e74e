//! rowshape-core: result-shape catalog library
//!
//! A [`Catalog`] is an ordered, owning collection of column [`Entry`]
//! values that describes the rows a query produces. Row materialization
//! reads it positionally; query builders look columns up by name.

pub mod config;
pub mod dialect;
pub mod error;
pub mod resolve;
pub mod schema;

pub use config::CatalogConfig;
pub use dialect::SqlDialect;
pub use error::{CatalogError, Diagnostic, DiagnosticKind, Result, Severity, Span};
pub use resolve::{ColumnKey, SpecResolver, SqlIdentResolver};
pub use schema::{Catalog, Entry, EntryDef, EntryKey, NameComparer, ShapeBuilder};
