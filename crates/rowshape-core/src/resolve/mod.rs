//! Resolution of dynamic column specifications into column keys

use sqlparser::ast::{Expr, Ident};
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::Token;

use crate::dialect::SqlDialect;
use crate::error::{CatalogError, Result};

/// A column reference a catalog can look up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKey {
    /// `table.column`
    Qualified { table: String, column: String },
    /// A bare column name, matched against every table
    Column(String),
}

impl ColumnKey {
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnKey::Qualified {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn column(column: impl Into<String>) -> Self {
        ColumnKey::Column(column.into())
    }

    pub fn column_name(&self) -> &str {
        match self {
            ColumnKey::Qualified { column, .. } | ColumnKey::Column(column) => column,
        }
    }
}

impl std::fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKey::Qualified { table, column } => write!(f, "{}.{}", table, column),
            ColumnKey::Column(column) => write!(f, "{}", column),
        }
    }
}

/// Turns a dynamic column specification into a [`ColumnKey`]
pub trait SpecResolver {
    fn resolve(&self, spec: &str) -> Result<ColumnKey>;
}

impl<F> SpecResolver for F
where
    F: Fn(&str) -> Result<ColumnKey>,
{
    fn resolve(&self, spec: &str) -> Result<ColumnKey> {
        self(spec)
    }
}

/// Resolves SQL column references (`col`, `table.col`, `schema.table.col`),
/// honoring the dialect's identifier quoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlIdentResolver {
    dialect: SqlDialect,
}

impl SqlIdentResolver {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    fn parse(&self, spec: &str) -> std::result::Result<Expr, ParserError> {
        let dialect = self.dialect.parser_dialect();
        let mut parser = Parser::new(dialect.as_ref()).try_with_sql(spec)?;
        let expr = parser.parse_expr()?;
        match parser.peek_token().token {
            Token::EOF => Ok(expr),
            token => Err(ParserError::ParserError(format!(
                "unexpected '{}' after column reference",
                token
            ))),
        }
    }
}

impl SpecResolver for SqlIdentResolver {
    fn resolve(&self, spec: &str) -> Result<ColumnKey> {
        let invalid = |reason: String| CatalogError::InvalidSpec {
            spec: spec.to_string(),
            reason,
        };

        let expr = self.parse(spec).map_err(|e| invalid(e.to_string()))?;
        match expr {
            Expr::Identifier(ident) => Ok(ColumnKey::Column(ident.value)),
            Expr::CompoundIdentifier(idents) => match idents.as_slice() {
                [table, column] | [_, table, column] => Ok(qualified_key(table, column)),
                _ => Err(invalid(format!(
                    "expected at most 3 name parts, found {}",
                    idents.len()
                ))),
            },
            other => Err(invalid(format!("'{}' is not a column reference", other))),
        }
    }
}

fn qualified_key(table: &Ident, column: &Ident) -> ColumnKey {
    ColumnKey::qualified(&table.value, &column.value)
}
