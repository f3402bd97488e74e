//! Name comparison policy

use std::borrow::Cow;
use std::fmt;

/// Case-sensitivity policy applied to every table and column name
/// comparison within one catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NameComparer {
    case_sensitive: bool,
}

impl NameComparer {
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Normalize a name so that equal names under this policy compare equal as strings.
    ///
    /// Case-insensitive names fold with [`str::to_lowercase`]; a name is
    /// borrowed only when folding would leave every character unchanged.
    pub fn normalize<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if self.case_sensitive || is_folded(name) {
            Cow::Borrowed(name)
        } else {
            Cow::Owned(name.to_lowercase())
        }
    }

    /// Normalize an optional table name. Absent and empty both mean the default table.
    pub fn normalize_table<'a>(&self, table: Option<&'a str>) -> Option<Cow<'a, str>> {
        table.filter(|t| !t.is_empty()).map(|t| self.normalize(t))
    }

    pub fn names_equal(&self, a: &str, b: &str) -> bool {
        self.normalize(a) == self.normalize(b)
    }

    pub fn tables_equal(&self, a: Option<&str>, b: Option<&str>) -> bool {
        self.normalize_table(a) == self.normalize_table(b)
    }

    /// Build the normalized identity of a (table, column) pair
    pub fn key(&self, table: Option<&str>, column: &str) -> EntryKey {
        EntryKey {
            table: self.normalize_table(table).map(Cow::into_owned),
            column: self.normalize(column).into_owned(),
        }
    }
}

/// Titlecase letters such as `ǅ` are neither upper- nor lowercase but still fold
fn is_folded(name: &str) -> bool {
    name.chars().flat_map(char::to_lowercase).eq(name.chars())
}

/// Normalized (table, column) identity of an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub(crate) table: Option<String>,
    pub(crate) column: String,
}

impl EntryKey {
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}
