//! Output formatting

use miette::{IntoDiagnostic, Result};
use rowshape_core::{Catalog, Diagnostic, Entry, Severity};

use crate::args::OutputFormat;

/// Output formatter for catalogs, lookups and diagnostics
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print every entry of a catalog in order
    pub fn print_catalog(&self, catalog: &Catalog) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                let policy = if catalog.case_sensitive_names() {
                    "case-sensitive"
                } else {
                    "case-insensitive"
                };
                println!("Result shape ({} columns, {} names):", catalog.len()?, policy);
                for (index, entry) in catalog.iter()?.enumerate() {
                    println!("{:>4}  {}", index, describe(entry));
                }
            }
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "case_sensitive_names": catalog.case_sensitive_names(),
                    "entries": catalog.to_defs()?,
                });
                println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
            }
        }
        Ok(())
    }

    /// Print the outcome of a column lookup
    pub fn print_lookup(&self, spec: &str, found: Option<(usize, &Entry)>) -> Result<()> {
        match self.format {
            OutputFormat::Human => match found {
                Some((index, entry)) => println!("{:>4}  {}", index, describe(entry)),
                None => eprintln!("Column '{}' not found", spec),
            },
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "spec": spec,
                    "index": found.map(|(index, _)| index),
                    "entry": found.map(|(_, entry)| entry.def()),
                });
                println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
            }
        }
        Ok(())
    }

    /// Print diagnostics raised for `file_name`
    pub fn print_diagnostics(
        &self,
        file_name: &str,
        diagnostics: &[Diagnostic],
        source: &str,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Human => print_human(file_name, diagnostics, source),
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "file": file_name,
                    "diagnostics": diagnostics,
                });
                println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
            }
        }
        Ok(())
    }
}

fn describe(entry: &Entry) -> String {
    let mut line = entry.to_string();
    let flags: Vec<&str> = [
        (entry.is_primary_key(), "pk"),
        (entry.is_unique(), "unique"),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, name)| *name)
    .collect();
    if !flags.is_empty() {
        line.push_str(&format!(" [{}]", flags.join(", ")));
    }
    if let Some(alias) = entry.alias() {
        line.push_str(&format!(" as {}", alias));
    }
    line
}

fn print_human(file_name: &str, diagnostics: &[Diagnostic], source: &str) {
    for diag in diagnostics {
        let severity_str = match diag.severity {
            Severity::Error => "\x1b[31merror\x1b[0m",
            Severity::Warning => "\x1b[33mwarning\x1b[0m",
        };

        eprintln!("{}[{}]: {}", severity_str, diag.code(), diag.message);

        if let Some(span) = &diag.span {
            eprintln!("  --> {}:{}:{}", file_name, span.line, span.column);

            if let Some(source_line) = source.lines().nth(span.line.saturating_sub(1)) {
                eprintln!("   |");
                eprintln!("{:>3} | {}", span.line, source_line);
                let padding = " ".repeat(span.column.saturating_sub(1));
                let underline = "^".repeat(span.length.max(1));
                eprintln!("   | {}{}", padding, underline);
            }
        }

        if let Some(help) = &diag.help {
            eprintln!("   = help: {}", help);
        }

        eprintln!();
    }
}
