//! Shape builder - derives result-shape catalogs from DDL and SELECT statements

use indexmap::IndexMap;
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, Expr, Ident, ObjectName, SelectItem, SetExpr,
    Statement, TableConstraint, TableFactor,
};
use sqlparser::parser::Parser;
use tracing::{debug, warn};

use crate::config::CatalogConfig;
use crate::dialect::SqlDialect;
use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::schema::{Catalog, Entry, EntryDef, NameComparer};

/// Columns of one declared table, in declaration order
#[derive(Debug, Clone)]
struct TableShape {
    name: String,
    columns: Vec<EntryDef>,
}

impl TableShape {
    fn column(&self, names: &NameComparer, column: &str) -> Option<&EntryDef> {
        self.columns
            .iter()
            .find(|def| names.names_equal(&def.column, column))
    }

    fn column_mut(&mut self, names: &NameComparer, column: &str) -> Option<&mut EntryDef> {
        self.columns
            .iter_mut()
            .find(|def| names.names_equal(&def.column, column))
    }

    /// Mark key flags from a PRIMARY KEY or UNIQUE constraint over `columns`
    fn apply_key(&mut self, names: &NameComparer, columns: &[Ident], is_primary: bool) {
        let single = columns.len() == 1;
        for ident in columns {
            if let Some(def) = self.column_mut(names, &ident.value) {
                if is_primary {
                    def.is_primary_key = true;
                }
                if single {
                    def.is_unique = true;
                }
            }
        }
    }
}

/// Builds result-shape catalogs from table definitions.
///
/// DDL fed through [`ShapeBuilder::parse`] declares tables; each SELECT
/// passed to [`ShapeBuilder::shape_of`] then yields a fresh catalog
/// describing its rows.
pub struct ShapeBuilder {
    dialect: SqlDialect,
    config: CatalogConfig,
    names: NameComparer,
    /// Normalized table name -> table
    tables: IndexMap<String, TableShape>,
    diagnostics: Vec<Diagnostic>,
}

impl ShapeBuilder {
    pub fn new() -> Self {
        Self::with_dialect(SqlDialect::default())
    }

    /// Builder for `dialect`, comparing names under the dialect's default policy
    pub fn with_dialect(dialect: SqlDialect) -> Self {
        let config = dialect.catalog_config();
        Self {
            dialect,
            config,
            names: NameComparer::new(config.case_sensitive_names),
            tables: IndexMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Use `config` for name comparison and for the catalogs this builder produces
    pub fn with_config(mut self, config: CatalogConfig) -> Self {
        self.config = config;
        self.names = NameComparer::new(config.case_sensitive_names);
        let tables = std::mem::take(&mut self.tables);
        for (_, table) in tables {
            let key = self.table_key(&table.name);
            self.tables.insert(key, table);
        }
        self
    }

    /// Parse DDL and record the tables it declares.
    ///
    /// When the script as a whole does not parse, statements are parsed one
    /// by one and unparseable ones are skipped with a warning.
    pub fn parse(&mut self, sql: &str) -> Result<(), Vec<Diagnostic>> {
        let dialect = self.dialect.parser_dialect();

        match Parser::parse_sql(dialect.as_ref(), sql) {
            Ok(statements) => {
                for stmt in &statements {
                    self.process_statement(stmt);
                }
            }
            Err(e) => {
                debug!(error = %e, "script did not parse as a whole, splitting statements");
                for raw in split_statements(sql) {
                    match Parser::parse_sql(dialect.as_ref(), raw) {
                        Ok(statements) => {
                            for stmt in &statements {
                                self.process_statement(stmt);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "skipping unparseable statement");
                        }
                    }
                }
            }
        }

        if self.diagnostics.iter().any(Diagnostic::is_error) {
            Err(std::mem::take(&mut self.diagnostics))
        } else {
            Ok(())
        }
    }

    fn process_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::CreateTable(create) => {
                self.process_create_table(&create.name, &create.columns, &create.constraints);
            }
            Statement::AlterTable {
                name, operations, ..
            } => {
                self.process_alter_table(name, operations);
            }
            _ => {}
        }
    }

    fn process_create_table(
        &mut self,
        name: &ObjectName,
        columns: &[ColumnDef],
        constraints: &[TableConstraint],
    ) {
        let table_name = object_table_name(name);
        let mut table = TableShape {
            name: table_name.clone(),
            columns: Vec::with_capacity(columns.len()),
        };

        for column in columns {
            table.columns.push(column_entry(&table_name, column));
        }
        for constraint in constraints {
            apply_constraint(&self.names, &mut table, constraint);
        }

        let key = self.table_key(&table_name);
        if self.tables.contains_key(&key) {
            self.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::DuplicateTable,
                format!(
                    "Table '{}' is defined more than once; the last definition wins",
                    table_name
                ),
            ));
        }
        debug!(table = %table_name, columns = table.columns.len(), "declared table");
        self.tables.insert(key, table);
    }

    fn process_alter_table(&mut self, name: &ObjectName, operations: &[AlterTableOperation]) {
        let table_name = object_table_name(name);
        let names = self.names;
        let key = self.table_key(&table_name);
        let Some(table) = self.tables.get_mut(&key) else {
            self.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::TableNotFound,
                    format!(
                        "ALTER TABLE references table '{}' which was not found in schema",
                        table_name
                    ),
                )
                .with_help("Ensure the CREATE TABLE statement appears before ALTER TABLE"),
            );
            return;
        };

        for operation in operations {
            match operation {
                AlterTableOperation::AddColumn { column_def, .. } => {
                    let def = column_entry(&table.name, column_def);
                    table.columns.retain(|c| !names.names_equal(&c.column, &def.column));
                    table.columns.push(def);
                }
                AlterTableOperation::DropColumn { column_name, .. } => {
                    table
                        .columns
                        .retain(|c| !names.names_equal(&c.column, &column_name.value));
                }
                AlterTableOperation::RenameColumn {
                    old_column_name,
                    new_column_name,
                } => {
                    if let Some(def) = table.column_mut(&names, &old_column_name.value) {
                        def.column = new_column_name.value.clone();
                    }
                }
                AlterTableOperation::AddConstraint(constraint) => {
                    apply_constraint(&names, table, constraint);
                }
                _ => {}
            }
        }
    }

    fn table_key(&self, name: &str) -> String {
        self.names.normalize(name).into_owned()
    }

    fn table(&self, name: &str) -> Option<&TableShape> {
        self.tables.get(&self.table_key(name))
    }

    /// Declared table names, in declaration order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.values().map(|t| t.name.as_str())
    }

    /// Shape of `SELECT * FROM table`
    pub fn table_catalog(&self, table: &str) -> Result<Catalog, Vec<Diagnostic>> {
        let Some(shape) = self.table(table) else {
            return Err(vec![Diagnostic::error(
                DiagnosticKind::TableNotFound,
                format!("Table '{}' not found", table),
            )]);
        };
        let mut diagnostics = Vec::new();
        let catalog = self.collect(shape.columns.iter().cloned(), &mut diagnostics);
        finish(catalog, diagnostics)
    }

    /// Shape of the rows produced by a single SELECT statement
    pub fn shape_of(&self, sql: &str) -> Result<Catalog, Vec<Diagnostic>> {
        let dialect = self.dialect.parser_dialect();
        let statements = Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
            vec![Diagnostic::error(
                DiagnosticKind::ParseError,
                format!("Parse error: {}", e),
            )]
        })?;

        let [Statement::Query(query)] = statements.as_slice() else {
            return Err(vec![Diagnostic::error(
                DiagnosticKind::UnsupportedQuery,
                "Expected exactly one SELECT statement",
            )]);
        };
        let SetExpr::Select(select) = query.body.as_ref() else {
            return Err(vec![Diagnostic::error(
                DiagnosticKind::UnsupportedQuery,
                "Only plain SELECT queries describe a result shape",
            )
            .with_help("Set operations and VALUES lists are not supported")]);
        };

        let mut diagnostics = Vec::new();
        let mut scope = Scope::default();
        for table_with_joins in &select.from {
            self.bind(&mut scope, &table_with_joins.relation, &mut diagnostics);
            for join in &table_with_joins.joins {
                self.bind(&mut scope, &join.relation, &mut diagnostics);
            }
        }

        let mut defs = Vec::new();
        for (index, item) in select.projection.iter().enumerate() {
            self.project(&scope, index + 1, item, &mut defs, &mut diagnostics);
        }
        let catalog = self.collect(defs, &mut diagnostics);
        finish(catalog, diagnostics)
    }

    /// Consume the builder and return a catalog of every declared column
    pub fn build(self) -> (Catalog, Vec<Diagnostic>) {
        let mut diagnostics = self.diagnostics.clone();
        let defs = self.tables.values().flat_map(|t| t.columns.iter().cloned());
        let catalog = self.collect(defs, &mut diagnostics);
        (catalog, diagnostics)
    }

    fn collect(
        &self,
        defs: impl IntoIterator<Item = EntryDef>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Catalog {
        let mut catalog = Catalog::with_config(&self.config);
        for def in defs {
            if let Err(e) = Entry::new(def).and_then(|entry| catalog.add(entry)) {
                diagnostics.push(
                    Diagnostic::error(DiagnosticKind::DuplicateColumn, e.to_string())
                        .with_help("Give one of the columns an alias or drop the repeated reference"),
                );
            }
        }
        catalog
    }

    fn bind<'a>(
        &'a self,
        scope: &mut Scope<'a>,
        factor: &TableFactor,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let TableFactor::Table { name, alias, .. } = factor else {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::UnsupportedQuery,
                format!("FROM item '{}' has no known columns", factor),
            ));
            return;
        };

        let table_name = object_table_name(name);
        match self.table(&table_name) {
            Some(table) => {
                let binding = alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or_else(|| table.name.clone());
                scope.tables.push((binding, table));
            }
            None => {
                let mut diag = Diagnostic::error(
                    DiagnosticKind::TableNotFound,
                    format!("Table '{}' not found", table_name),
                )
                .with_help("Check that the table exists in your schema definition");
                if let Some(ident) = name.0.last() {
                    diag = diag.with_span(Span::from_sqlparser(&ident.span));
                }
                diagnostics.push(diag);
            }
        }
    }

    /// Append the result columns of the select-list item at 1-based `position`
    fn project(
        &self,
        scope: &Scope<'_>,
        position: usize,
        item: &SelectItem,
        defs: &mut Vec<EntryDef>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        match item {
            SelectItem::Wildcard(_) => {
                for (_, table) in &scope.tables {
                    defs.extend(table.columns.iter().cloned());
                }
            }
            SelectItem::QualifiedWildcard(name, _) => {
                let qualifier = object_table_name(name);
                match scope.lookup(&self.names, &qualifier) {
                    Some(table) => defs.extend(table.columns.iter().cloned()),
                    None => diagnostics.push(Diagnostic::error(
                        DiagnosticKind::TableNotFound,
                        format!("Table or alias '{}' not found in FROM clause", qualifier),
                    )),
                }
            }
            SelectItem::UnnamedExpr(expr) => {
                if let Some(def) = self.project_expr(scope, expr, diagnostics) {
                    defs.push(def);
                } else if !is_column_ref(expr) {
                    defs.push(EntryDef::new(format!("?column?{}", position)));
                }
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                match self.project_expr(scope, expr, diagnostics) {
                    Some(def) => defs.push(def.with_alias(&alias.value)),
                    None if !is_column_ref(expr) => defs.push(EntryDef::new(&alias.value)),
                    None => {}
                }
            }
        }
    }

    /// Resolve a column reference to the column it reads.
    /// `None` for computed expressions and for references that failed to resolve.
    fn project_expr(
        &self,
        scope: &Scope<'_>,
        expr: &Expr,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<EntryDef> {
        match expr {
            Expr::Nested(inner) => self.project_expr(scope, inner, diagnostics),
            Expr::Identifier(ident) => self.resolve_bare(scope, ident, diagnostics),
            Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
                let column = &idents[idents.len() - 1];
                let qualifier = &idents[idents.len() - 2];
                let Some(table) = scope.lookup(&self.names, &qualifier.value) else {
                    diagnostics.push(
                        Diagnostic::error(
                            DiagnosticKind::TableNotFound,
                            format!(
                                "Table or alias '{}' not found in FROM clause",
                                qualifier.value
                            ),
                        )
                        .with_span(Span::from_sqlparser(&qualifier.span)),
                    );
                    return None;
                };
                match table.column(&self.names, &column.value) {
                    Some(def) => Some(def.clone()),
                    None => {
                        diagnostics.push(
                            Diagnostic::error(
                                DiagnosticKind::ColumnNotFound,
                                format!(
                                    "Column '{}' not found in table '{}'",
                                    column.value, table.name
                                ),
                            )
                            .with_span(Span::from_sqlparser(&column.span)),
                        );
                        None
                    }
                }
            }
            _ => None,
        }
    }

    fn resolve_bare(
        &self,
        scope: &Scope<'_>,
        ident: &Ident,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<EntryDef> {
        let found: Vec<(&str, &EntryDef)> = scope
            .tables
            .iter()
            .filter_map(|(binding, table)| {
                table
                    .column(&self.names, &ident.value)
                    .map(|def| (binding.as_str(), def))
            })
            .collect();
        let span = Span::from_sqlparser(&ident.span);

        match found.as_slice() {
            [] => {
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::ColumnNotFound,
                        format!("Column '{}' not found", ident.value),
                    )
                    .with_span(span),
                );
                None
            }
            [(_, def)] => Some((*def).clone()),
            [(first, _), ..] => {
                let bindings: Vec<&str> = found.iter().map(|(binding, _)| *binding).collect();
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::AmbiguousColumn,
                        format!(
                            "Column '{}' is ambiguous (found in tables: {})",
                            ident.value,
                            bindings.join(", ")
                        ),
                    )
                    .with_span(span)
                    .with_help(format!(
                        "Qualify the column with a table name: {}.{}",
                        first, ident.value
                    )),
                );
                None
            }
        }
    }
}

impl Default for ShapeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tables visible to a SELECT list, by binding name (alias or table name)
#[derive(Default)]
struct Scope<'a> {
    tables: Vec<(String, &'a TableShape)>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, names: &NameComparer, binding: &str) -> Option<&'a TableShape> {
        self.tables
            .iter()
            .find(|(name, _)| names.names_equal(name, binding))
            .map(|(_, table)| *table)
    }
}

fn finish(catalog: Catalog, diagnostics: Vec<Diagnostic>) -> Result<Catalog, Vec<Diagnostic>> {
    if diagnostics.iter().any(Diagnostic::is_error) {
        Err(diagnostics)
    } else {
        Ok(catalog)
    }
}

fn is_column_ref(expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => true,
        Expr::Nested(inner) => is_column_ref(inner),
        _ => false,
    }
}

/// Table part of a possibly schema-qualified name
fn object_table_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_else(|| name.to_string())
}

fn column_entry(table: &str, column: &ColumnDef) -> EntryDef {
    let mut def = EntryDef::new(&column.name.value).in_table(table);
    for option in &column.options {
        if let ColumnOption::Unique { is_primary, .. } = &option.option {
            def.is_unique = true;
            if *is_primary {
                def.is_primary_key = true;
            }
        }
    }
    def
}

fn apply_constraint(names: &NameComparer, table: &mut TableShape, constraint: &TableConstraint) {
    match constraint {
        TableConstraint::PrimaryKey { columns, .. } => table.apply_key(names, columns, true),
        TableConstraint::Unique { columns, .. } => table.apply_key(names, columns, false),
        _ => {}
    }
}

/// Split a script on top-level semicolons. Quoted text, dollar-quoted
/// bodies and `--` comments are kept intact.
fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        match ch {
            '\'' | '"' | '`' => {
                for (_, c) in chars.by_ref() {
                    if c == ch {
                        break;
                    }
                }
            }
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '$' => {
                let rest = &sql[i + 1..];
                let Some(tag_len) = rest.find('$') else {
                    continue;
                };
                let tag = &sql[i..i + tag_len + 2];
                if !tag[1..tag.len() - 1]
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_')
                {
                    continue;
                }
                let body_start = i + tag.len();
                let end = sql[body_start..]
                    .find(tag)
                    .map_or(sql.len(), |pos| body_start + pos + tag.len());
                while matches!(chars.peek(), Some((j, _)) if *j < end) {
                    chars.next();
                }
            }
            ';' => {
                let stmt = sql[start..i].trim();
                if !stmt.is_empty() {
                    statements.push(stmt);
                }
                start = i + 1;
            }
            _ => {}
        }
    }

    let tail = sql[start..].trim();
    if !tail.is_empty() {
        statements.push(tail);
    }
    statements
}
