//! SQL dialects accepted by the shape builder and the spec resolver

use std::fmt;
use std::str::FromStr;

use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect};

use crate::config::CatalogConfig;

/// SQL dialect used to parse DDL, SELECT statements and column specifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SqlDialect {
    #[default]
    PostgreSQL,
    MySQL,
}

impl SqlDialect {
    pub const ALL: [SqlDialect; 2] = [SqlDialect::PostgreSQL, SqlDialect::MySQL];

    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::PostgreSQL => Box::new(PostgreSqlDialect {}),
            SqlDialect::MySQL => Box::new(MySqlDialect {}),
        }
    }

    /// Canonical name followed by accepted aliases
    fn names(&self) -> &'static [&'static str] {
        match self {
            SqlDialect::PostgreSQL => &["postgresql", "postgres", "pg"],
            SqlDialect::MySQL => &["mysql", "mysql8"],
        }
    }

    /// Name policy used when neither configuration nor flags choose one.
    ///
    /// PostgreSQL folds unquoted identifiers and MySQL compares column names
    /// without regard to case, so both start case-insensitive.
    pub fn default_case_sensitive_names(&self) -> bool {
        match self {
            SqlDialect::PostgreSQL => false,
            SqlDialect::MySQL => false,
        }
    }

    /// Catalog settings implied by this dialect
    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig::default().case_sensitive(self.default_case_sensitive_names())
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|dialect| dialect.names().contains(&wanted.as_str()))
            .ok_or_else(|| {
                let supported: Vec<_> = Self::ALL.iter().map(|d| d.names()[0]).collect();
                format!(
                    "Unknown dialect: '{}'. Supported dialects: {}.",
                    s,
                    supported.join(", ")
                )
            })
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.names()[0])
    }
}
