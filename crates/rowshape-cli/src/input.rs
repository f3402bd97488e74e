//! Loading schema and entry files

use std::fs;
use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use rowshape_core::{Catalog, CatalogConfig, Diagnostic, Entry, EntryDef, ShapeBuilder, SqlDialect};
use serde::Deserialize;

/// Entry file layout shared by JSON and TOML inputs
#[derive(Debug, Deserialize)]
struct EntryFile {
    #[serde(default, alias = "entry")]
    entries: Vec<EntryDef>,
}

/// Diagnostics raised while reading one schema file
pub struct FileDiagnostics {
    pub file: PathBuf,
    pub source: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Everything loaded from the configured inputs
pub struct Inputs {
    pub builder: ShapeBuilder,
    pub entries: Vec<EntryDef>,
}

pub enum Loaded {
    Ready(Inputs),
    /// A schema file failed to parse
    Failed(FileDiagnostics),
}

impl Inputs {
    /// Catalog of every declared table column followed by every entry-file entry
    pub fn catalog(self) -> Result<(Catalog, Vec<Diagnostic>)> {
        let (mut catalog, diagnostics) = self.builder.build();
        let entries = self
            .entries
            .into_iter()
            .map(Entry::new)
            .collect::<Result<Vec<_>, _>>()?;
        catalog.add_range(entries, true)?;
        Ok((catalog, diagnostics))
    }
}

/// Expand glob patterns into file paths
pub fn expand(patterns: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern_str = pattern.display().to_string();
        if pattern_str.contains('*') {
            for path in glob::glob(&pattern_str).into_diagnostic()?.flatten() {
                files.push(path);
            }
        } else {
            files.push(pattern.clone());
        }
    }
    Ok(files)
}

/// Read schema (.sql) and entry (.json, .toml) files.
/// Stops at the first schema file that fails to parse.
pub fn load(files: &[PathBuf], dialect: SqlDialect, config: CatalogConfig) -> Result<Loaded> {
    let mut builder = ShapeBuilder::with_dialect(dialect).with_config(config);
    let mut entries = Vec::new();

    for file in files {
        let source = fs::read_to_string(file).into_diagnostic()?;
        match extension(file).as_deref() {
            Some("json") => {
                let parsed: EntryFile = serde_json::from_str(&source).into_diagnostic()?;
                entries.extend(parsed.entries);
            }
            Some("toml") => {
                let parsed: EntryFile = toml::from_str(&source).into_diagnostic()?;
                entries.extend(parsed.entries);
            }
            _ => {
                if let Err(diagnostics) = builder.parse(&source) {
                    return Ok(Loaded::Failed(FileDiagnostics {
                        file: file.clone(),
                        source,
                        diagnostics,
                    }));
                }
            }
        }
        tracing::debug!(file = %file.display(), "loaded input");
    }

    Ok(Loaded::Ready(Inputs { builder, entries }))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}
