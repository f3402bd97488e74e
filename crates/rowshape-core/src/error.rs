//! Error and diagnostic types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`CatalogError`].
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors raised by catalog operations.
///
/// Absence is never an error: lookups that find nothing return `None`,
/// and removing a non-member returns `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error, miette::Diagnostic)]
pub enum CatalogError {
    /// An entry with the same normalized (table, column) identity is already a member.
    #[error("Column '{name}' is already present in the catalog")]
    #[diagnostic(
        code(rowshape::duplicate_identity),
        help("Qualify the column with a distinct table name or remove the existing entry first")
    )]
    DuplicateIdentity { name: String },

    /// The entry belongs to another catalog and cloning was not permitted.
    #[error("Entry '{name}' is owned by another catalog")]
    #[diagnostic(
        code(rowshape::ownership),
        help("Remove it from its catalog first, or add a clone of it")
    )]
    Ownership { name: String },

    /// A column-only lookup matched more than one entry under strict resolution.
    #[error("Column '{column}' is ambiguous (found in tables: {})", .tables.join(", "))]
    #[diagnostic(
        code(rowshape::ambiguous_match),
        help("Qualify the column with a table name")
    )]
    AmbiguousMatch { column: String, tables: Vec<String> },

    #[error("Index {index} is out of range for a catalog of {len} entries")]
    #[diagnostic(code(rowshape::index_out_of_range))]
    IndexOutOfRange { index: usize, len: usize },

    /// The catalog was torn down by a disposing clear.
    #[error("Catalog has been disposed")]
    #[diagnostic(code(rowshape::disposed))]
    Disposed,

    /// The entry's resources were released when its former catalog was disposed.
    #[error("Entry '{name}' has been disposed")]
    #[diagnostic(code(rowshape::entry_disposed))]
    EntryDisposed { name: String },

    #[error("Column name must not be empty")]
    #[diagnostic(code(rowshape::empty_column))]
    EmptyColumnName,

    /// A dynamic column specification could not be resolved to a column key.
    #[error("Invalid column specification '{spec}': {reason}")]
    #[diagnostic(
        code(rowshape::invalid_spec),
        help("Use 'column' or 'table.column'")
    )]
    InvalidSpec { spec: String, reason: String },
}

/// Source location span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Length in characters
    pub length: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, length: usize) -> Self {
        Self {
            line,
            column,
            length,
        }
    }

    /// Create a span from sqlparser's Span
    pub fn from_sqlparser(span: &sqlparser::tokenizer::Span) -> Self {
        let start = span.start;
        let end = span.end;
        let length = if end.line == start.line && end.column > start.column {
            (end.column - start.column) as usize
        } else {
            1
        };
        Self::new(start.line as usize, start.column as usize, length)
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Problem found while deriving a result shape from SQL text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: message.into(),
            span: None,
            help: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            span: None,
            help: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Get the error code string (e.g., "E0001")
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Types of diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// E0001: Table not found
    TableNotFound,
    /// E0002: Column not found
    ColumnNotFound,
    /// E0003: Ambiguous column reference
    AmbiguousColumn,
    /// E0004: Two result columns share one identity
    DuplicateColumn,
    /// E0005: Statement does not describe a result shape
    UnsupportedQuery,
    /// E0006: Table declared more than once
    DuplicateTable,
    /// Parse error
    ParseError,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::TableNotFound => "E0001",
            DiagnosticKind::ColumnNotFound => "E0002",
            DiagnosticKind::AmbiguousColumn => "E0003",
            DiagnosticKind::DuplicateColumn => "E0004",
            DiagnosticKind::UnsupportedQuery => "E0005",
            DiagnosticKind::DuplicateTable => "E0006",
            DiagnosticKind::ParseError => "E1000",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::TableNotFound => "table-not-found",
            DiagnosticKind::ColumnNotFound => "column-not-found",
            DiagnosticKind::AmbiguousColumn => "ambiguous-column",
            DiagnosticKind::DuplicateColumn => "duplicate-column",
            DiagnosticKind::UnsupportedQuery => "unsupported-query",
            DiagnosticKind::DuplicateTable => "duplicate-table",
            DiagnosticKind::ParseError => "parse-error",
        }
    }
}
