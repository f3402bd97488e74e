//! Configuration file handling

use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use rowshape_core::{CatalogConfig, SqlDialect};

use crate::args::{CatalogArgs, OutputFormat};

/// Configuration for rowshape
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Schema and entry file paths or patterns
    #[serde(default)]
    pub schema: Vec<String>,

    /// SQL dialect ("postgresql" or "mysql")
    #[serde(default)]
    pub dialect: Option<String>,

    /// Output format (human, json)
    #[serde(default)]
    pub format: Option<String>,

    /// Compare names case-sensitively. Unset means the dialect's default.
    #[serde(default)]
    pub case_sensitive_names: Option<bool>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        let config: Config = toml::from_str(&contents).into_diagnostic()?;
        Ok(config)
    }

    /// Load the given file, or the nearest rowshape.toml in the current directory or its parents
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let mut current_dir = std::env::current_dir().into_diagnostic()?;
        loop {
            let config_path = current_dir.join("rowshape.toml");
            if config_path.exists() {
                tracing::info!(path = %config_path.display(), "using configuration file");
                return Self::from_file(&config_path);
            }
            if !current_dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Merge CLI arguments into configuration.
    /// CLI arguments take precedence over config file values; positional
    /// `files` join the `--schema` paths.
    pub fn merge_with_args(mut self, args: &CatalogArgs, files: &[PathBuf]) -> Self {
        if !args.schema.is_empty() || !files.is_empty() {
            self.schema = args
                .schema
                .iter()
                .chain(files)
                .map(|p| p.display().to_string())
                .collect();
        }

        if let Some(dialect) = &args.dialect {
            self.dialect = Some(dialect.clone());
        }

        if let Some(fmt) = args.format {
            self.format = Some(format!("{:?}", fmt).to_lowercase());
        }

        if args.case_sensitive {
            self.case_sensitive_names = Some(true);
        }

        self
    }

    pub fn output_format(&self) -> OutputFormat {
        match self.format.as_deref() {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Human,
        }
    }

    pub fn schema_paths(&self) -> Vec<PathBuf> {
        self.schema.iter().map(PathBuf::from).collect()
    }

    /// Catalog settings, falling back to the dialect when the name policy is unset
    pub fn catalog_config(&self, dialect: SqlDialect) -> CatalogConfig {
        match self.case_sensitive_names {
            Some(case_sensitive) => CatalogConfig::default().case_sensitive(case_sensitive),
            None => dialect.catalog_config(),
        }
    }
}
