//! rowshape CLI - query result shape inspection tool

mod args;
mod config;
mod input;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use rowshape_core::{Catalog, SqlDialect, SqlIdentResolver};

use crate::args::{Args, CatalogArgs, Command};
use crate::config::Config;
use crate::input::{Inputs, Loaded};
use crate::output::OutputFormatter;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match (args.quiet, args.verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::WARN,
        (false, 1) => tracing::Level::INFO,
        (false, _) => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

/// Settings resolved from the configuration file and CLI flags
struct Session {
    config: Config,
    dialect: SqlDialect,
    formatter: OutputFormatter,
}

impl Session {
    fn new(
        global_config: Option<&std::path::Path>,
        args: &CatalogArgs,
        files: &[PathBuf],
    ) -> Result<Self> {
        let config = Config::load(global_config)?.merge_with_args(args, files);
        let dialect: SqlDialect = match &config.dialect {
            Some(name) => name.parse().map_err(|e: String| miette::miette!(e))?,
            None => SqlDialect::default(),
        };
        let formatter = OutputFormatter::new(config.output_format());
        Ok(Self {
            config,
            dialect,
            formatter,
        })
    }

    /// Load every configured input. `None` once diagnostics have been printed.
    fn load(&self) -> Result<Option<Inputs>> {
        let files = input::expand(&self.config.schema_paths())?;
        if files.is_empty() {
            miette::bail!("No schema files specified. Pass files, use --schema, or configure in rowshape.toml");
        }

        let catalog_config = self.config.catalog_config(self.dialect);
        match input::load(&files, self.dialect, catalog_config)? {
            Loaded::Ready(inputs) => Ok(Some(inputs)),
            Loaded::Failed(failed) => {
                self.formatter.print_diagnostics(
                    &failed.file.display().to_string(),
                    &failed.diagnostics,
                    &failed.source,
                )?;
                Ok(None)
            }
        }
    }

    /// Catalog of all inputs, with schema warnings reported on stderr
    fn full_catalog(&self, inputs: Inputs) -> Result<Catalog> {
        let (catalog, warnings) = inputs.catalog()?;
        if !warnings.is_empty() {
            self.formatter.print_diagnostics("<schema>", &warnings, "")?;
        }
        Ok(catalog)
    }
}

/// Returns whether the command succeeded
fn run(args: Args) -> Result<bool> {
    let global_config = args.config.as_deref();

    match &args.command {
        Command::Show { catalog, files } => {
            let session = Session::new(global_config, catalog, files)?;
            let Some(inputs) = session.load()? else {
                return Ok(false);
            };
            let catalog = session.full_catalog(inputs)?;
            session.formatter.print_catalog(&catalog)?;
            Ok(true)
        }

        Command::Shape { catalog, query } => {
            let session = Session::new(global_config, catalog, &[])?;
            let Some(inputs) = session.load()? else {
                return Ok(false);
            };
            match inputs.builder.shape_of(query) {
                Ok(shape) => {
                    session.formatter.print_catalog(&shape)?;
                    Ok(true)
                }
                Err(diagnostics) => {
                    session
                        .formatter
                        .print_diagnostics("<query>", &diagnostics, query)?;
                    Ok(false)
                }
            }
        }

        Command::Find {
            catalog,
            spec,
            query,
            lenient,
        } => {
            let session = Session::new(global_config, catalog, &[])?;
            let Some(inputs) = session.load()? else {
                return Ok(false);
            };

            let catalog = match query {
                Some(sql) => match inputs.builder.shape_of(sql) {
                    Ok(shape) => shape,
                    Err(diagnostics) => {
                        session
                            .formatter
                            .print_diagnostics("<query>", &diagnostics, sql)?;
                        return Ok(false);
                    }
                },
                None => session.full_catalog(inputs)?,
            };

            let resolver = SqlIdentResolver::new(session.dialect);
            let found = match catalog.find_entry_by_spec(&resolver, spec, !lenient)? {
                Some(entry) => catalog.index_of(entry)?.map(|index| (index, entry)),
                None => None,
            };
            session.formatter.print_lookup(spec, found)?;
            Ok(found.is_some())
        }
    }
}
