//! Result-shape catalog - ordered, owning collection of column entries

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::map::Values;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::resolve::{ColumnKey, SpecResolver};
use crate::schema::entry::{Entry, EntryDef, ORPHAN};
use crate::schema::names::{EntryKey, NameComparer};

static NEXT_CATALOG_ID: AtomicU64 = AtomicU64::new(ORPHAN + 1);

/// Label used for the default table in messages
const DEFAULT_TABLE_LABEL: &str = "<default>";

/// Ordered collection of column entries describing the rows of one query.
///
/// The catalog owns its entries: an entry belongs to at most one catalog at
/// a time, and no two members share a normalized (table, column) identity.
/// Insertion order is the positional order used to map raw row values, and
/// only removal shifts it.
///
/// Every operation fails with [`CatalogError::Disposed`] once the catalog
/// has been torn down with `clear(true)` or [`Catalog::dispose`].
#[derive(Debug)]
pub struct Catalog {
    id: u64,
    names: NameComparer,
    /// Normalized identity -> entry, in insertion order
    entries: IndexMap<EntryKey, Entry>,
    disposed: bool,
}

impl Catalog {
    pub fn new(case_sensitive_names: bool) -> Self {
        Self {
            id: NEXT_CATALOG_ID.fetch_add(1, Ordering::Relaxed),
            names: NameComparer::new(case_sensitive_names),
            entries: IndexMap::new(),
            disposed: false,
        }
    }

    pub fn with_config(config: &CatalogConfig) -> Self {
        Self::new(config.case_sensitive_names)
    }

    /// Build a catalog from plain entry values, in order
    pub fn from_defs(
        case_sensitive_names: bool,
        defs: impl IntoIterator<Item = EntryDef>,
    ) -> Result<Self> {
        let mut catalog = Self::new(case_sensitive_names);
        for def in defs {
            catalog.add(Entry::new(def)?)?;
        }
        Ok(catalog)
    }

    pub fn case_sensitive_names(&self) -> bool {
        self.names.is_case_sensitive()
    }

    pub fn name_comparer(&self) -> NameComparer {
        self.names
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(CatalogError::Disposed)
        } else {
            Ok(())
        }
    }

    pub fn len(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.entries.is_empty())
    }

    /// Entry at a position, in insertion order
    pub fn at(&self, index: usize) -> Result<&Entry> {
        self.ensure_live()?;
        self.entries
            .get_index(index)
            .map(|(_, entry)| entry)
            .ok_or(CatalogError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Position of `entry`, by identity. `None` if it is not a member.
    pub fn index_of(&self, entry: &Entry) -> Result<Option<usize>> {
        self.ensure_live()?;
        if !entry.is_owned_by(self.id) {
            return Ok(None);
        }
        let key = self.names.key(entry.table(), entry.column());
        Ok(self
            .entries
            .get_full(&key)
            .filter(|(_, _, member)| member.ptr_eq(entry))
            .map(|(index, _, _)| index))
    }

    /// Membership by identity, not by value
    pub fn contains(&self, entry: &Entry) -> Result<bool> {
        Ok(self.index_of(entry)?.is_some())
    }

    /// Append an entry, taking ownership of it
    pub fn add(&mut self, entry: Entry) -> Result<()> {
        self.ensure_live()?;
        self.insert(entry)
    }

    /// Create an entry for (table, column), add it and return a handle to it
    pub fn add_create(&mut self, table: Option<&str>, column: &str) -> Result<Entry> {
        self.ensure_live()?;
        let entry = Entry::create(table, column)?;
        self.insert(entry.clone())?;
        Ok(entry)
    }

    /// Add entries in order. Entries owned by another catalog are cloned when
    /// `clone_not_orphans` is set and rejected otherwise.
    ///
    /// Processing stops at the first failure; entries added before it stay.
    pub fn add_range(
        &mut self,
        entries: impl IntoIterator<Item = Entry>,
        clone_not_orphans: bool,
    ) -> Result<()> {
        self.ensure_live()?;
        for entry in entries {
            let owned_elsewhere = !entry.is_orphan() && !entry.is_owned_by(self.id);
            if !owned_elsewhere {
                self.insert(entry)?;
            } else if clone_not_orphans {
                self.insert(entry.clone_orphan())?;
            } else {
                return Err(CatalogError::Ownership {
                    name: entry.to_string(),
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, entry: Entry) -> Result<()> {
        if entry.is_disposed() {
            return Err(CatalogError::EntryDisposed {
                name: entry.to_string(),
            });
        }
        if !entry.is_orphan() && !entry.is_owned_by(self.id) {
            return Err(CatalogError::Ownership {
                name: entry.to_string(),
            });
        }

        // A member always sits under its own key, so re-adding one lands here too
        let key = self.names.key(entry.table(), entry.column());
        if self.entries.contains_key(&key) {
            return Err(CatalogError::DuplicateIdentity {
                name: entry.to_string(),
            });
        }
        if !entry.claim(self.id) {
            return Err(CatalogError::Ownership {
                name: entry.to_string(),
            });
        }

        debug!(catalog = self.id, entry = %entry, position = self.entries.len(), "added entry");
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Remove a member by identity and release it. Returns `false` for non-members.
    pub fn remove(&mut self, entry: &Entry) -> Result<bool> {
        let Some(index) = self.index_of(entry)? else {
            return Ok(false);
        };
        if let Some((_, removed)) = self.entries.shift_remove_index(index) {
            removed.release(self.id);
            debug!(catalog = self.id, entry = %removed, position = index, "removed entry");
        }
        Ok(true)
    }

    /// Remove every entry and release ownership of each.
    ///
    /// With `dispose_members` the removed entries are disposed as well and the
    /// catalog is torn down: every later call fails with [`CatalogError::Disposed`].
    pub fn clear(&mut self, dispose_members: bool) -> Result<()> {
        self.ensure_live()?;
        self.release_all(dispose_members);
        if dispose_members {
            self.disposed = true;
            debug!(catalog = self.id, "disposed catalog");
        }
        Ok(())
    }

    /// Tear the catalog down. Calling it again is a no-op.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.release_all(true);
            self.disposed = true;
            debug!(catalog = self.id, "disposed catalog");
        }
    }

    fn release_all(&mut self, dispose_members: bool) {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain(..) {
            entry.release(self.id);
            if dispose_members {
                entry.dispose();
            }
        }
        debug!(catalog = self.id, count, dispose_members, "cleared entries");
    }

    /// Exact lookup by (table, column). A `None` table matches entries of the default table.
    pub fn find_entry(&self, table: Option<&str>, column: &str) -> Result<Option<&Entry>> {
        self.ensure_live()?;
        let key = self.names.key(table, column);
        trace!(catalog = self.id, key = %key, "find entry");
        Ok(self.entries.get(&key))
    }

    /// Lookup by column name across all tables.
    ///
    /// Several matches are an [`CatalogError::AmbiguousMatch`] when
    /// `raise_on_ambiguous` is set, and `None` otherwise.
    pub fn find_entry_by_column(
        &self,
        column: &str,
        raise_on_ambiguous: bool,
    ) -> Result<Option<&Entry>> {
        let mut matches = self.find_column(column)?;
        let first = matches.next();
        let second = matches.next();
        trace!(catalog = self.id, column, "find entry by column");

        match (first, second) {
            (None, _) => Ok(None),
            (Some(entry), None) => Ok(Some(entry)),
            (Some(_), Some(_)) if raise_on_ambiguous => {
                let tables = self
                    .find_column(column)?
                    .map(|entry| entry.table().unwrap_or(DEFAULT_TABLE_LABEL).to_string())
                    .collect();
                Err(CatalogError::AmbiguousMatch {
                    column: column.to_string(),
                    tables,
                })
            }
            (Some(_), Some(_)) => Ok(None),
        }
    }

    /// Resolve a dynamic column specification with `resolver`, then look it up
    pub fn find_entry_by_spec<R>(
        &self,
        resolver: &R,
        spec: &str,
        raise_on_ambiguous: bool,
    ) -> Result<Option<&Entry>>
    where
        R: SpecResolver + ?Sized,
    {
        self.ensure_live()?;
        match resolver.resolve(spec)? {
            ColumnKey::Qualified { table, column } => self.find_entry(Some(&table), &column),
            ColumnKey::Column(column) => self.find_entry_by_column(&column, raise_on_ambiguous),
        }
    }

    /// Entries of one table, in catalog order. A `None` table selects the default table.
    pub fn find_table<'a>(
        &'a self,
        table: Option<&str>,
    ) -> Result<impl Iterator<Item = &'a Entry> + 'a> {
        self.ensure_live()?;
        let wanted = self.names.normalize_table(table).map(Cow::into_owned);
        Ok(self
            .entries
            .iter()
            .filter(move |(key, _)| key.table == wanted)
            .map(|(_, entry)| entry))
    }

    /// Entries with the given column name in any table, in catalog order
    pub fn find_column<'a>(&'a self, column: &str) -> Result<impl Iterator<Item = &'a Entry> + 'a> {
        self.ensure_live()?;
        let wanted = self.names.normalize(column).into_owned();
        Ok(self
            .entries
            .iter()
            .filter(move |(key, _)| key.column == wanted)
            .map(|(_, entry)| entry))
    }

    pub fn primary_key_columns(&self) -> Result<impl Iterator<Item = &Entry>> {
        Ok(self.iter()?.filter(|entry| entry.is_primary_key()))
    }

    pub fn unique_valued_columns(&self) -> Result<impl Iterator<Item = &Entry>> {
        Ok(self.iter()?.filter(|entry| entry.is_unique()))
    }

    /// All entries in catalog order
    pub fn iter(&self) -> Result<Values<'_, EntryKey, Entry>> {
        self.ensure_live()?;
        Ok(self.entries.values())
    }

    /// Distinct table names in order of first appearance. `None` is the default table.
    pub fn table_names(&self) -> Result<Vec<Option<&str>>> {
        self.ensure_live()?;
        let mut seen: Vec<&Option<String>> = Vec::new();
        let mut names = Vec::new();
        for (key, entry) in &self.entries {
            if !seen.contains(&&key.table) {
                seen.push(&key.table);
                names.push(entry.table());
            }
        }
        Ok(names)
    }

    pub fn column_names(&self) -> Result<Vec<&str>> {
        Ok(self.iter()?.map(Entry::column).collect())
    }

    /// Same name policy and the same entries by value, in any order
    pub fn equivalent_to(&self, other: &Catalog) -> Result<bool> {
        self.ensure_live()?;
        other.ensure_live()?;
        if self.names != other.names || self.entries.len() != other.entries.len() {
            return Ok(false);
        }
        // Keys are unique on both sides, so a key-wise match is a one-to-one pairing
        Ok(self.entries.iter().all(|(key, entry)| {
            other.entries.get(key).is_some_and(|candidate| {
                candidate.is_primary_key() == entry.is_primary_key()
                    && candidate.is_unique() == entry.is_unique()
            })
        }))
    }

    /// Plain values of all entries, in order
    pub fn to_defs(&self) -> Result<Vec<EntryDef>> {
        Ok(self.iter()?.map(|entry| entry.def().clone()).collect())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_config(&CatalogConfig::default())
    }
}

/// Deep copy: every entry is cloned as a new orphan and owned by the copy.
/// A disposed catalog clones to a disposed catalog.
impl Clone for Catalog {
    fn clone(&self) -> Self {
        let mut copy = Catalog::new(self.names.is_case_sensitive());
        copy.disposed = self.disposed;
        for (key, entry) in &self.entries {
            let fresh = entry.clone_orphan();
            fresh.claim(copy.id);
            copy.entries.insert(key.clone(), fresh);
        }
        debug!(source = self.id, copy = copy.id, count = copy.entries.len(), "cloned catalog");
        copy
    }
}

impl Drop for Catalog {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            entry.release(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_catalog() -> Catalog {
        let mut catalog = Catalog::new(false);
        catalog
            .add(Entry::new(EntryDef::new("Id").primary_key()).unwrap())
            .unwrap();
        catalog.add_create(Some("Orders"), "Id").unwrap();
        catalog.add_create(Some("Customers"), "Id").unwrap();
        catalog
    }

    #[test]
    fn test_add_preserves_order() {
        let catalog = orders_catalog();
        assert_eq!(catalog.len().unwrap(), 3);
        assert_eq!(catalog.at(0).unwrap().table(), None);
        assert_eq!(catalog.at(1).unwrap().table(), Some("Orders"));
        assert_eq!(catalog.at(2).unwrap().table(), Some("Customers"));
    }

    #[test]
    fn test_duplicate_identity_is_case_insensitive() {
        let mut catalog = orders_catalog();
        let err = catalog.add_create(Some("ORDERS"), "id").unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateIdentity { .. }));
        assert_eq!(catalog.len().unwrap(), 3);
    }

    #[test]
    fn test_titlecase_name_is_duplicate_of_lowercase() {
        let mut catalog = Catalog::new(false);
        catalog.add_create(None, "ǆ").unwrap();
        let err = catalog.add_create(None, "ǅ").unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateIdentity { .. }));
        assert_eq!(catalog.len().unwrap(), 1);
        assert_eq!(catalog.find_entry(None, "ǅ").unwrap().unwrap().column(), "ǆ");
    }

    #[test]
    fn test_case_sensitive_catalog_allows_case_variants() {
        let mut catalog = Catalog::new(true);
        catalog.add_create(None, "Id").unwrap();
        catalog.add_create(None, "id").unwrap();
        assert_eq!(catalog.len().unwrap(), 2);
        assert!(catalog.find_entry(None, "ID").unwrap().is_none());
    }

    #[test]
    fn test_add_member_twice_is_duplicate() {
        let mut catalog = Catalog::new(false);
        let entry = catalog.add_create(None, "id").unwrap();
        let err = catalog.add(entry).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateIdentity { .. }));
    }

    #[test]
    fn test_add_owned_elsewhere_fails() {
        let mut first = Catalog::new(false);
        let entry = first.add_create(Some("t"), "a").unwrap();

        let mut second = Catalog::new(false);
        let err = second.add(entry.clone()).unwrap_err();
        assert!(matches!(err, CatalogError::Ownership { .. }));
        assert!(first.contains(&entry).unwrap());
        assert!(!second.contains(&entry).unwrap());
    }

    #[test]
    fn test_at_out_of_range() {
        let catalog = orders_catalog();
        let err = catalog.at(3).unwrap_err();
        assert_eq!(err, CatalogError::IndexOutOfRange { index: 3, len: 3 });
    }

    #[test]
    fn test_index_of_is_by_identity() {
        let catalog = orders_catalog();
        let member = catalog.at(1).unwrap().clone();
        assert_eq!(catalog.index_of(&member).unwrap(), Some(1));

        let lookalike = member.clone_orphan();
        assert_eq!(catalog.index_of(&lookalike).unwrap(), None);
        assert!(!catalog.contains(&lookalike).unwrap());
    }

    #[test]
    fn test_remove_releases_and_shifts_positions() {
        let mut catalog = orders_catalog();
        let orders = catalog.at(1).unwrap().clone();
        let customers = catalog.at(2).unwrap().clone();

        assert!(catalog.remove(&orders).unwrap());
        assert!(orders.is_orphan());
        assert!(!orders.is_disposed());
        assert_eq!(catalog.index_of(&customers).unwrap(), Some(1));
        assert!(!catalog.remove(&orders).unwrap());

        // A released entry can be adopted by another catalog
        let mut other = Catalog::new(false);
        other.add(orders.clone()).unwrap();
        assert!(other.contains(&orders).unwrap());
    }

    #[test]
    fn test_find_entry_default_table() {
        let catalog = orders_catalog();
        let entry = catalog.find_entry(None, "ID").unwrap().unwrap();
        assert!(entry.is_primary_key());
        let entry = catalog.find_entry(Some(""), "id").unwrap().unwrap();
        assert_eq!(entry.table(), None);
        assert!(catalog.find_entry(Some("Missing"), "id").unwrap().is_none());
    }

    #[test]
    fn test_find_entry_by_column_ambiguity() {
        let mut catalog = orders_catalog();
        catalog.add_create(Some("Orders"), "Total").unwrap();

        let err = catalog.find_entry_by_column("id", true).unwrap_err();
        assert_eq!(
            err,
            CatalogError::AmbiguousMatch {
                column: "id".to_string(),
                tables: vec![
                    "<default>".to_string(),
                    "Orders".to_string(),
                    "Customers".to_string()
                ],
            }
        );
        assert!(catalog.find_entry_by_column("id", false).unwrap().is_none());

        let total = catalog.find_entry_by_column("TOTAL", true).unwrap().unwrap();
        assert_eq!(total.table(), Some("Orders"));
        assert!(catalog.find_entry_by_column("missing", true).unwrap().is_none());
    }

    #[test]
    fn test_find_entry_by_spec_with_closure_resolver() {
        let catalog = orders_catalog();
        let resolver = |spec: &str| -> Result<ColumnKey> {
            Ok(match spec.split_once(':') {
                Some((table, column)) => ColumnKey::qualified(table, column),
                None => ColumnKey::column(spec),
            })
        };

        let entry = catalog
            .find_entry_by_spec(&resolver, "customers:id", true)
            .unwrap()
            .unwrap();
        assert_eq!(entry.table(), Some("Customers"));
        assert!(catalog.find_entry_by_spec(&resolver, "id", false).unwrap().is_none());
    }

    #[test]
    fn test_find_table_and_filters() {
        let catalog = orders_catalog();

        let orders: Vec<_> = catalog.find_table(Some("orders")).unwrap().collect();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].to_string(), "Orders.Id");

        let defaults: Vec<_> = catalog.find_table(None).unwrap().collect();
        assert_eq!(defaults.len(), 1);

        let pks: Vec<_> = catalog.primary_key_columns().unwrap().collect();
        assert_eq!(pks.len(), 1);
        assert_eq!(pks[0].table(), None);
        assert_eq!(catalog.unique_valued_columns().unwrap().count(), 0);
    }

    #[test]
    fn test_iteration_reflects_current_state() {
        let mut catalog = orders_catalog();
        assert_eq!(catalog.iter().unwrap().count(), 3);
        catalog.add_create(Some("Orders"), "Total").unwrap();
        let columns: Vec<_> = catalog.iter().unwrap().map(|e| e.to_string()).collect();
        assert_eq!(columns, ["Id", "Orders.Id", "Customers.Id", "Orders.Total"]);
    }

    #[test]
    fn test_add_range_clones_foreign_entries() {
        let source = orders_catalog();
        let mut target = Catalog::new(false);
        let orphan = Entry::create(Some("Orders"), "Total").unwrap();

        let foreign: Vec<Entry> = source.iter().unwrap().cloned().collect();
        target
            .add_range(foreign.iter().cloned().chain([orphan.clone()]), true)
            .unwrap();

        assert_eq!(target.len().unwrap(), 4);
        assert!(target.contains(&orphan).unwrap());
        for entry in &foreign {
            assert!(source.contains(entry).unwrap());
            assert!(!target.contains(entry).unwrap());
        }
    }

    #[test]
    fn test_add_range_without_cloning_stops_at_foreign_entry() {
        let source = orders_catalog();
        let mut target = Catalog::new(false);
        let first = Entry::create(Some("Orders"), "Total").unwrap();
        let foreign = source.at(0).unwrap().clone();
        let last = Entry::create(Some("Orders"), "Placed").unwrap();

        let err = target
            .add_range([first.clone(), foreign.clone(), last.clone()], false)
            .unwrap_err();
        assert!(matches!(err, CatalogError::Ownership { .. }));
        assert!(target.contains(&first).unwrap());
        assert!(!target.contains(&foreign).unwrap());
        assert!(last.is_orphan());
        assert_eq!(target.len().unwrap(), 1);
    }

    #[test]
    fn test_clone_is_deep_and_equivalent() {
        let catalog = orders_catalog();
        let mut copy = catalog.clone();

        assert!(copy.equivalent_to(&catalog).unwrap());
        for (original, cloned) in catalog.iter().unwrap().zip(copy.iter().unwrap()) {
            assert!(!original.ptr_eq(cloned));
            assert!(original.same_shape(cloned));
        }

        let first = copy.at(0).unwrap().clone();
        copy.remove(&first).unwrap();
        assert_eq!(catalog.len().unwrap(), 3);
        assert!(!copy.equivalent_to(&catalog).unwrap());
    }

    #[test]
    fn test_equivalence_ignores_order_but_not_policy_or_flags() {
        let a = Catalog::from_defs(
            false,
            [EntryDef::new("a").in_table("t"), EntryDef::new("b").unique()],
        )
        .unwrap();
        let b = Catalog::from_defs(
            false,
            [EntryDef::new("B").unique(), EntryDef::new("A").in_table("T")],
        )
        .unwrap();
        assert!(a.equivalent_to(&b).unwrap());

        let c = Catalog::from_defs(false, [EntryDef::new("a").in_table("t"), EntryDef::new("b")])
            .unwrap();
        assert!(!a.equivalent_to(&c).unwrap());

        let d = Catalog::from_defs(
            true,
            [EntryDef::new("a").in_table("t"), EntryDef::new("b").unique()],
        )
        .unwrap();
        assert!(!a.equivalent_to(&d).unwrap());
    }

    #[test]
    fn test_clear_without_dispose_keeps_catalog_usable() {
        let mut catalog = orders_catalog();
        let entry = catalog.at(0).unwrap().clone();

        catalog.clear(false).unwrap();
        assert!(catalog.is_empty().unwrap());
        assert!(entry.is_orphan());
        assert!(!entry.is_disposed());

        catalog.add(entry.clone()).unwrap();
        assert_eq!(catalog.index_of(&entry).unwrap(), Some(0));
    }

    #[test]
    fn test_clear_with_dispose_tears_down() {
        let mut catalog = orders_catalog();
        let entry = catalog.at(0).unwrap().clone();

        catalog.clear(true).unwrap();
        assert!(catalog.is_disposed());
        assert!(entry.is_orphan());
        assert!(entry.is_disposed());

        assert_eq!(catalog.len().unwrap_err(), CatalogError::Disposed);
        assert_eq!(catalog.find_entry(None, "id").unwrap_err(), CatalogError::Disposed);
        assert_eq!(catalog.add_create(None, "x").unwrap_err(), CatalogError::Disposed);
        assert_eq!(catalog.clear(false).unwrap_err(), CatalogError::Disposed);
        assert!(catalog.iter().is_err());

        // Disposed entries cannot be adopted again
        let mut other = Catalog::new(false);
        let err = other.add(entry).unwrap_err();
        assert!(matches!(err, CatalogError::EntryDisposed { .. }));

        catalog.dispose();
        assert!(catalog.is_disposed());
    }

    #[test]
    fn test_drop_releases_entries() {
        let entry = {
            let mut catalog = Catalog::new(false);
            catalog.add_create(None, "id").unwrap()
        };
        assert!(entry.is_orphan());
        assert!(!entry.is_disposed());
    }

    #[test]
    fn test_table_and_column_names() {
        let mut catalog = orders_catalog();
        catalog.add_create(Some("orders"), "Total").unwrap();
        assert_eq!(
            catalog.table_names().unwrap(),
            vec![None, Some("Orders"), Some("Customers")]
        );
        assert_eq!(
            catalog.column_names().unwrap(),
            vec!["Id", "Id", "Id", "Total"]
        );
    }
}
