//! Column descriptors held by a catalog

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Owner id of an entry that belongs to no catalog
pub(crate) const ORPHAN: u64 = 0;

/// Attribute values of a column descriptor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryDef {
    /// Table the column comes from. `None` is the default table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub column: String,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl EntryDef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Self::default()
        }
    }

    pub fn in_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

struct EntryInner {
    def: EntryDef,
    owner: AtomicU64,
    disposed: AtomicBool,
}

/// Shared handle to a column descriptor.
///
/// Cloning the handle does not copy the entry: both handles refer to the
/// same entry and [`Entry::ptr_eq`] holds between them. Use
/// [`Entry::clone_orphan`] for an independent copy.
///
/// Attributes are immutable once constructed. The only state that changes
/// is which catalog owns the entry, and that is managed by the catalog.
#[derive(Clone)]
pub struct Entry(Arc<EntryInner>);

impl Entry {
    /// Create an orphan entry. An empty table name is stored as the default table.
    pub fn new(mut def: EntryDef) -> Result<Self> {
        if def.column.is_empty() {
            return Err(CatalogError::EmptyColumnName);
        }
        if def.table.as_deref() == Some("") {
            def.table = None;
        }
        Ok(Self(Arc::new(EntryInner {
            def,
            owner: AtomicU64::new(ORPHAN),
            disposed: AtomicBool::new(false),
        })))
    }

    /// Create an orphan entry with no key flags
    pub fn create(table: Option<&str>, column: &str) -> Result<Self> {
        let mut def = EntryDef::new(column);
        def.table = table.map(str::to_string);
        Self::new(def)
    }

    pub fn def(&self) -> &EntryDef {
        &self.0.def
    }

    pub fn table(&self) -> Option<&str> {
        self.0.def.table.as_deref()
    }

    pub fn column(&self) -> &str {
        &self.0.def.column
    }

    pub fn is_primary_key(&self) -> bool {
        self.0.def.is_primary_key
    }

    pub fn is_unique(&self) -> bool {
        self.0.def.is_unique
    }

    pub fn alias(&self) -> Option<&str> {
        self.0.def.alias.as_deref()
    }

    /// Name under which the column appears in a result row
    pub fn output_name(&self) -> &str {
        self.alias().unwrap_or_else(|| self.column())
    }

    pub fn is_orphan(&self) -> bool {
        self.owner() == ORPHAN
    }

    pub fn is_disposed(&self) -> bool {
        self.0.disposed.load(Ordering::Acquire)
    }

    /// Whether both handles refer to the same entry
    pub fn ptr_eq(&self, other: &Entry) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Structural equality: same table, column and key flags, regardless of identity.
    /// Names are compared exactly.
    pub fn same_shape(&self, other: &Entry) -> bool {
        let (a, b) = (self.def(), other.def());
        a.table == b.table
            && a.column == b.column
            && a.is_primary_key == b.is_primary_key
            && a.is_unique == b.is_unique
    }

    /// New orphan entry with identical attribute values
    pub fn clone_orphan(&self) -> Entry {
        Self(Arc::new(EntryInner {
            def: self.0.def.clone(),
            owner: AtomicU64::new(ORPHAN),
            disposed: AtomicBool::new(false),
        }))
    }

    pub(crate) fn owner(&self) -> u64 {
        self.0.owner.load(Ordering::Acquire)
    }

    pub(crate) fn is_owned_by(&self, catalog: u64) -> bool {
        self.owner() == catalog
    }

    /// Take ownership for `catalog`. Fails if another catalog got there first.
    pub(crate) fn claim(&self, catalog: u64) -> bool {
        self.0
            .owner
            .compare_exchange(ORPHAN, catalog, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release(&self, catalog: u64) {
        let _ = self.0.owner.compare_exchange(
            catalog,
            ORPHAN,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn dispose(&self) {
        self.0.disposed.store(true, Ordering::Release);
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table() {
            Some(table) => write!(f, "{}.{}", table, self.column()),
            None => write!(f, "{}", self.column()),
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("table", &self.table())
            .field("column", &self.column())
            .field("is_primary_key", &self.is_primary_key())
            .field("is_unique", &self.is_unique())
            .field("alias", &self.alias())
            .field("orphan", &self.is_orphan())
            .finish()
    }
}

impl TryFrom<EntryDef> for Entry {
    type Error = CatalogError;

    fn try_from(def: EntryDef) -> Result<Self> {
        Entry::new(def)
    }
}
