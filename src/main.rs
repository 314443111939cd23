//! Binary entry point for archon-dal.
//!
//! Administrative commands for the Archon data access layer: schema and
//! configuration diagnostics, migration scripts, and backend status.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stdout/print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result, bail};
use archon_dal::config::{RepositoryKind, vars};
use archon_dal::models::Record;
use archon_dal::schema::{DatabaseType, storage_tables};
use archon_dal::services::RepositoryFactory;
use archon_dal::validation::{DatabaseConfigValidation, Severity};
use archon_dal::{DalConfig, DatabaseConfigValidator, DatabaseSchemaValidator, observability};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

/// Archon data access layer administration.
#[derive(Parser)]
#[command(name = "archon-dal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "ARCHON_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Check the canonical schema against database type mappings.
    ValidateSchema {
        /// Database to check (default: all).
        #[arg(short, long)]
        database: Option<String>,

        /// Print JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Check environment configuration for a database.
    ValidateConfig {
        /// Database to check (default: the one selected by DATABASE_TYPE).
        #[arg(short, long)]
        database: Option<String>,

        /// Check every database.
        #[arg(long, conflicts_with = "database")]
        all: bool,

        /// Print JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Print a .env template for a database.
    EnvTemplate {
        /// Target database.
        database: String,
    },

    /// Print DDL for the canonical schema on a target database.
    MigrationScript {
        /// Database the schema is migrated from.
        #[arg(long, default_value = "supabase")]
        source: String,

        /// Database the DDL is written for.
        #[arg(long)]
        target: String,
    },

    /// Apply bundled SQLite migrations and report their state.
    Migrate {
        /// Database file (overrides configuration).
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Show the configured backend and row counts.
    Status,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads `.env`, then the configuration file, then the environment.
fn load_config(path: Option<&std::path::Path>) -> Result<DalConfig> {
    let _ = dotenvy::dotenv();
    DalConfig::load_with(&archon_dal::config::EnvSource, path).context("loading configuration")
}

/// Runs the selected command.
async fn run_command(command: Commands, config: DalConfig) -> Result<ExitCode> {
    match command {
        Commands::ValidateSchema { database, json } => cmd_validate_schema(database.as_deref(), json),
        Commands::ValidateConfig {
            database,
            all,
            json,
        } => cmd_validate_config(database.as_deref(), all, json),
        Commands::EnvTemplate { database } => {
            let database = parse_database(&database)?;
            print!(
                "{}",
                DatabaseConfigValidator::from_env().export_configuration_template(database)
            );
            Ok(ExitCode::SUCCESS)
        },
        Commands::MigrationScript { source, target } => {
            let script = DatabaseSchemaValidator::new()
                .generate_migration_script(parse_database(&source)?, parse_database(&target)?);
            print!("{script}");
            Ok(ExitCode::SUCCESS)
        },
        Commands::Migrate { path } => cmd_migrate(config, path).await,
        Commands::Status => cmd_status(config).await,
    }
}

fn parse_database(name: &str) -> Result<DatabaseType> {
    match DatabaseType::parse(name) {
        Some(database) => Ok(database),
        None => bail!("unknown database '{name}' (expected supabase, postgresql, mysql or sqlite)"),
    }
}

fn cmd_validate_schema(database: Option<&str>, json: bool) -> Result<ExitCode> {
    let validator = DatabaseSchemaValidator::new();
    let reports: BTreeMap<String, Vec<_>> = match database {
        Some(name) => {
            let database = parse_database(name)?;
            std::iter::once((database.to_string(), validator.validate_adapter(database))).collect()
        },
        None => validator.validate_all_adapters(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (database, results) in &reports {
            let compatible = results.iter().filter(|r| r.compatible).count();
            println!("{database}: {compatible}/{} tables compatible", results.len());
            for result in results {
                for issue in &result.issues {
                    println!("  [issue]   {}: {issue}", result.table_name);
                }
                for warning in &result.warnings {
                    println!("  [warning] {}: {warning}", result.table_name);
                }
                for suggestion in &result.suggestions {
                    println!("  [suggest] {}: {suggestion}", result.table_name);
                }
            }
        }
    }

    let all_compatible = reports.values().flatten().all(|r| r.compatible);
    Ok(if all_compatible {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_validate_config(database: Option<&str>, all: bool, json: bool) -> Result<ExitCode> {
    let validator = DatabaseConfigValidator::from_env();
    let reports: Vec<DatabaseConfigValidation> = if all {
        validator.validate_all_databases().into_values().collect()
    } else if let Some(name) = database {
        vec![validator.validate_database(parse_database(name)?)]
    } else {
        vec![validator.get_current_database_validation()]
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let verdict = if report.valid { "valid" } else { "invalid" };
            println!("{} ({verdict}, score {})", report.database_type, report.score);
            for result in &report.results {
                let label = match result.severity {
                    None => "ok",
                    Some(Severity::Info) => "info",
                    Some(Severity::Warning) => "warning",
                    Some(Severity::Error) => "error",
                };
                match &result.suggested_value {
                    Some(value) => println!(
                        "  [{label}] {}: {} (suggested: {value})",
                        result.field, result.message
                    ),
                    None => println!("  [{label}] {}: {}", result.field, result.message),
                }
            }
        }
    }

    Ok(if reports.iter().all(|r| r.valid) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn cmd_migrate(config: DalConfig, path: Option<PathBuf>) -> Result<ExitCode> {
    let mut sqlite = config.sqlite;
    if let Some(path) = path {
        sqlite.path = path;
    }
    let repository = RepositoryFactory::create_sqlite(&sqlite)
        .await
        .with_context(|| format!("opening {}", sqlite.path.display()))?;

    println!("{}", sqlite.path.display());
    for status in repository.migration_status().await? {
        println!(
            "  {} {:<24} {}",
            status.version,
            status.name,
            status.state.as_str()
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_status(config: DalConfig) -> Result<ExitCode> {
    if config.repository == RepositoryKind::Supabase && config.supabase.url.is_none() {
        bail!(
            "{} is not set (select another backend with {})",
            vars::SUPABASE_URL,
            vars::DATABASE_TYPE
        );
    }
    let repository = RepositoryFactory::create(&config).await?;

    println!("backend: {}", config.repository);
    let no_filters = Record::new();
    for table in storage_tables() {
        match repository.get_table_count(table.name, &no_filters).await {
            Ok(count) => println!("  {:<24} {count}", table.name),
            Err(e) => println!("  {:<24} error: {e}", table.name),
        }
    }
    let applied = repository.get_applied_migrations().await?;
    println!("migrations applied: {}", applied.len());
    Ok(ExitCode::SUCCESS)
}
