//! CLI argument definitions

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "rowshape")]
#[command(author, version, about = "Inspect query result shapes")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to the nearest rowshape.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the catalog described by schema and entry files
    Show {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Schema or entry files, in addition to any given with --schema
        #[arg(value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Print the result shape of a SELECT statement
    Shape {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// SELECT statement to describe
        query: String,
    },

    /// Look up a column by `column` or `table.column`
    Find {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Column specification
        spec: String,

        /// Look the column up in the shape of this SELECT instead of the whole schema
        #[arg(long, value_name = "SQL")]
        query: Option<String>,

        /// Report "not found" instead of failing when the column is ambiguous
        #[arg(long)]
        lenient: bool,
    },
}

/// Options shared by every command that builds a catalog
#[derive(ClapArgs)]
pub struct CatalogArgs {
    /// Schema (.sql) or entry (.json, .toml) files; glob patterns allowed
    #[arg(short, long = "schema", value_name = "FILE")]
    pub schema: Vec<PathBuf>,

    /// SQL dialect
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// Compare table and column names case-sensitively
    #[arg(long)]
    pub case_sensitive: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output
    Json,
}
