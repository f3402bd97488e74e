// Integration tests for the result-shape catalog
use proptest::prelude::*;
use rowshape_core::error::CatalogError;
use rowshape_core::resolve::SqlIdentResolver;
use rowshape_core::schema::{Catalog, Entry, EntryDef, ShapeBuilder};
use rowshape_core::{CatalogConfig, SqlDialect};

fn mixed_catalog() -> Catalog {
    let mut catalog = Catalog::with_config(&CatalogConfig::default());
    catalog
        .add_range(
            [
                Entry::new(EntryDef::new("Id").primary_key()).unwrap(),
                Entry::new(EntryDef::new("Id").in_table("Orders")).unwrap(),
                Entry::new(EntryDef::new("Id").in_table("Customers")).unwrap(),
            ],
            true,
        )
        .unwrap();
    catalog
}

#[test]
fn test_column_lookup_is_ambiguous_across_tables() {
    let catalog = mixed_catalog();

    let err = catalog.find_entry_by_column("id", true).unwrap_err();
    match err {
        CatalogError::AmbiguousMatch { column, tables } => {
            assert_eq!(column, "id");
            assert_eq!(tables.len(), 3);
        }
        other => panic!("expected ambiguous match, got {:?}", other),
    }
    assert!(catalog.find_entry_by_column("id", false).unwrap().is_none());
}

#[test]
fn test_find_table_selects_one_table() {
    let catalog = mixed_catalog();
    let orders: Vec<String> = catalog
        .find_table(Some("Orders"))
        .unwrap()
        .map(|e| e.to_string())
        .collect();
    assert_eq!(orders, vec!["Orders.Id"]);
}

#[test]
fn test_primary_key_columns() {
    let catalog = mixed_catalog();
    let pks: Vec<&Entry> = catalog.primary_key_columns().unwrap().collect();
    assert_eq!(pks.len(), 1);
    assert_eq!(pks[0].table(), None);
    assert_eq!(pks[0].column(), "Id");
}

#[test]
fn test_find_entry_round_trips_every_member() {
    let catalog = mixed_catalog();
    for (index, entry) in catalog.iter().unwrap().enumerate() {
        let found = catalog
            .find_entry(entry.table(), entry.column())
            .unwrap()
            .unwrap();
        assert!(found.ptr_eq(entry));
        assert_eq!(catalog.index_of(found).unwrap(), Some(index));
    }
}

#[test]
fn test_find_entry_by_sql_spec() {
    let catalog = mixed_catalog();
    let resolver = SqlIdentResolver::new(SqlDialect::PostgreSQL);

    let entry = catalog
        .find_entry_by_spec(&resolver, "customers.id", true)
        .unwrap()
        .unwrap();
    assert_eq!(entry.table(), Some("Customers"));

    let err = catalog
        .find_entry_by_spec(&resolver, "id", true)
        .unwrap_err();
    assert!(matches!(err, CatalogError::AmbiguousMatch { .. }));

    let err = catalog
        .find_entry_by_spec(&resolver, "lower(id)", true)
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidSpec { .. }));
}

#[test]
fn test_add_range_without_clone_leaves_target_unchanged() {
    let source = mixed_catalog();
    let mut target = Catalog::new(false);
    let foreign = source.at(1).unwrap().clone();

    let err = target.add_range([foreign.clone()], false).unwrap_err();
    assert!(matches!(err, CatalogError::Ownership { .. }));
    assert!(target.is_empty().unwrap());
    assert!(source.contains(&foreign).unwrap());
}

#[test]
fn test_add_range_stops_at_duplicate() {
    let mut catalog = mixed_catalog();
    let err = catalog
        .add_range(
            [
                Entry::create(Some("Orders"), "Total").unwrap(),
                Entry::create(Some("ORDERS"), "id").unwrap(),
                Entry::create(Some("Orders"), "Placed").unwrap(),
            ],
            true,
        )
        .unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateIdentity { .. }));
    assert_eq!(catalog.len().unwrap(), 4);
    assert!(catalog.find_entry(Some("orders"), "placed").unwrap().is_none());
}

#[test]
fn test_clone_survives_original_teardown() {
    let mut original = mixed_catalog();
    let copy = original.clone();

    original.clear(true).unwrap();
    assert_eq!(original.len().unwrap_err(), CatalogError::Disposed);
    assert_eq!(copy.len().unwrap(), 3);
    assert!(copy.iter().unwrap().all(|e| !e.is_disposed()));
}

#[test]
fn test_catalog_is_shareable_across_threads() {
    let catalog = std::sync::Arc::new(mixed_catalog());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let catalog = std::sync::Arc::clone(&catalog);
            std::thread::spawn(move || catalog.find_table(Some("orders")).unwrap().count())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
}

#[test]
fn test_defs_round_trip_through_catalog() {
    let catalog = mixed_catalog();
    let rebuilt = Catalog::from_defs(false, catalog.to_defs().unwrap()).unwrap();
    assert!(rebuilt.equivalent_to(&catalog).unwrap());
}

#[test]
fn test_shape_builder_feeds_catalog_lookups() {
    let mut builder = ShapeBuilder::new();
    builder
        .parse(
            "CREATE TABLE orders (id INT PRIMARY KEY, customer_id INT, total NUMERIC);
             CREATE TABLE customers (id INT PRIMARY KEY, email TEXT UNIQUE);",
        )
        .unwrap();

    let shape = builder
        .shape_of(
            "SELECT o.id, o.total, c.email \
             FROM orders o JOIN customers c ON c.id = o.customer_id",
        )
        .unwrap();
    assert_eq!(shape.len().unwrap(), 3);
    assert_eq!(shape.at(2).unwrap().column(), "email");
    assert_eq!(shape.unique_valued_columns().unwrap().count(), 2);
    assert!(shape.find_entry_by_column("id", true).unwrap().is_some());
}

fn entry_def() -> impl Strategy<Value = EntryDef> {
    (
        prop::option::of(prop::sample::select(vec!["a", "A", "b", ""])),
        prop::sample::select(vec!["x", "X", "y", "z"]),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(table, column, pk, unique)| EntryDef {
            table: table.map(str::to_string),
            column: column.to_string(),
            is_primary_key: pk,
            is_unique: unique,
            alias: None,
        })
}

#[derive(Debug, Clone)]
enum Op {
    Add(EntryDef),
    /// Orphans built from the defs, then the donor's members at the given positions
    AddRange {
        defs: Vec<EntryDef>,
        foreign: Vec<usize>,
        clone_not_orphans: bool,
    },
    Reclone,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => entry_def().prop_map(Op::Add),
        3 => (
            prop::collection::vec(entry_def(), 0..4),
            prop::collection::vec(any::<usize>(), 0..4),
            any::<bool>(),
        )
            .prop_map(|(defs, foreign, clone_not_orphans)| Op::AddRange {
                defs,
                foreign,
                clone_not_orphans,
            }),
        1 => Just(Op::Reclone),
    ]
}

fn assert_unique_keys(catalog: &Catalog) -> Result<(), TestCaseError> {
    let names = catalog.name_comparer();
    let mut keys: Vec<_> = catalog
        .iter()
        .unwrap()
        .map(|e| names.key(e.table(), e.column()))
        .collect();
    let count = keys.len();
    keys.sort_by_key(|k| k.to_string());
    keys.dedup();
    prop_assert_eq!(keys.len(), count);
    Ok(())
}

proptest! {
    #[test]
    fn prop_interleaved_adds_keep_identity_and_ownership(
        case_sensitive in any::<bool>(),
        donor_defs in prop::collection::vec(entry_def(), 0..12),
        ops in prop::collection::vec(op(), 0..24),
    ) {
        let mut donor = Catalog::new(!case_sensitive);
        for def in donor_defs {
            let _ = donor.add(Entry::new(def).unwrap());
        }
        let donor_len = donor.len().unwrap();

        let mut catalog = Catalog::new(case_sensitive);
        for op in ops {
            match op {
                Op::Add(def) => {
                    let _ = catalog.add(Entry::new(def).unwrap());
                }
                Op::AddRange { defs, foreign, clone_not_orphans } => {
                    let mut entries: Vec<Entry> =
                        defs.into_iter().map(|def| Entry::new(def).unwrap()).collect();
                    if donor_len > 0 {
                        let picked = foreign.iter().map(|i| donor.at(i % donor_len).unwrap());
                        entries.extend(picked.cloned());
                    }
                    let _ = catalog.add_range(entries, clone_not_orphans);
                }
                Op::Reclone => catalog = catalog.clone(),
            }
            assert_unique_keys(&catalog)?;
        }

        prop_assert_eq!(donor.len().unwrap(), donor_len);
        for entry in donor.iter().unwrap() {
            prop_assert!(donor.contains(entry).unwrap());
            prop_assert!(!catalog.contains(entry).unwrap());
        }
        for entry in catalog.iter().unwrap() {
            prop_assert!(catalog.contains(entry).unwrap());
            prop_assert!(!entry.is_orphan());
            prop_assert!(!donor.contains(entry).unwrap());
            prop_assert!(donor.iter().unwrap().all(|d| !d.ptr_eq(entry)));
        }
    }

    #[test]
    fn prop_members_never_share_identity(
        case_sensitive in any::<bool>(),
        defs in prop::collection::vec(entry_def(), 0..24),
    ) {
        let mut catalog = Catalog::new(case_sensitive);
        for def in defs {
            let _ = catalog.add(Entry::new(def).unwrap());
        }
        let copy = catalog.clone();

        for current in [&catalog, &copy] {
            assert_unique_keys(current)?;
        }
    }

    #[test]
    fn prop_clone_is_equivalent_and_disjoint(
        case_sensitive in any::<bool>(),
        defs in prop::collection::vec(entry_def(), 0..24),
    ) {
        let mut catalog = Catalog::new(case_sensitive);
        for def in defs {
            let _ = catalog.add(Entry::new(def).unwrap());
        }
        let copy = catalog.clone();

        prop_assert!(copy.equivalent_to(&catalog).unwrap());
        prop_assert_eq!(copy.len().unwrap(), catalog.len().unwrap());
        for entry in copy.iter().unwrap() {
            prop_assert!(!catalog.contains(entry).unwrap());
        }
    }
}
