//! Schema management module

mod builder;
mod catalog;
mod entry;
mod names;

pub use builder::ShapeBuilder;
pub use catalog::Catalog;
pub use entry::{Entry, EntryDef};
pub use names::{EntryKey, NameComparer};
