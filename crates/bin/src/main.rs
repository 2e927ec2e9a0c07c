//! LDP CLI binary.
//!
//! Runs the per-entity statistics jobs against a SQLite database.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ldp::pipeline::Stage;
use ldp::registry::{JobCategory, available_jobs, job_by_name};
use ldp::{Job, JobReport, Pipeline, PipelineConfig};
use ldp_data::{NullPolicy, SqliteStore, WriteStrategy};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ldp")]
#[command(about = "Per-entity statistics for LDP measurement tables", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one job against the database
    Run {
        /// Job name (see `ldp jobs`)
        job: String,

        /// SQLite database file
        #[arg(long, env = "LDP_DATABASE", default_value = "ldp.db")]
        database: PathBuf,

        /// Read this table instead of the job's source table
        #[arg(long)]
        table: Option<String>,

        /// Write this table instead of the job's target table
        #[arg(long)]
        target_table: Option<String>,

        /// Write strategy: targeted or replace (deprecated)
        #[arg(long, default_value = "targeted")]
        writer: WriteStrategy,

        /// Null handling for Value: fill-zero, drop or keep
        #[arg(long)]
        null_policy: Option<NullPolicy>,

        /// Output format (json or text)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List available jobs
    Jobs {
        /// Output format (json or text)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            job,
            database,
            table,
            target_table,
            writer,
            null_policy,
            format,
        } => {
            let config = PipelineConfig {
                table,
                target_table,
                writer,
                null_policy,
            };
            run_job(&job, &database, config, &format)?;
        }
        Commands::Jobs { format } => list_jobs(&format)?,
    }

    Ok(())
}

fn run_job(
    name: &str,
    database: &Path,
    config: PipelineConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let job = job_by_name(name)?;
    debug!(database = %database.display(), ?config, "opening database");
    let store = SqliteStore::new(database)?;
    let pipeline = Pipeline::new(&store, job.as_ref(), config);

    let report = if format == "json" {
        pipeline.run()?
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));

        let progress = |stage: Stage| pb.set_message(format!("{}: {}", name, stage));
        match pipeline.run_with_progress(progress) {
            Ok(report) => {
                pb.finish_with_message(format!("{}: done", name));
                report
            }
            Err(e) => {
                pb.finish_with_message(format!("{}: failed", name));
                return Err(e.into());
            }
        }
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &JobReport) {
    println!("\nJob:                {}", report.job);
    println!("Source table:       {}", report.source_table);
    println!("Target table:       {}", report.table);
    println!("Writer:             {}", report.writer);
    println!("Null policy:        {}", report.null_policy);
    println!("Rows loaded:        {}", report.rows_loaded);
    println!(
        "Partitions:         {} ({} with insufficient data)",
        report.partitions, report.skipped_partitions
    );
    println!("Rows written:       {}", report.rows_written);
    if report.rows_cleared > 0 {
        println!("Rows cleared:       {}", report.rows_cleared);
    }
    if report.forecast_rows > 0 || report.forecast_rows_removed > 0 {
        println!(
            "Forecast rows:      {} written, {} replaced",
            report.forecast_rows, report.forecast_rows_removed
        );
    }
    if !report.schema_changes.is_empty() {
        println!("Columns added:      {}", report.schema_changes.join(", "));
    }
}

fn list_jobs(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let jobs: Vec<(JobCategory, Box<dyn Job>)> = available_jobs()
        .iter()
        .map(|info| (info.category, info.job()))
        .collect();

    if format == "json" {
        let listing: Vec<_> = jobs
            .iter()
            .map(|(category, job)| {
                json!({
                    "name": job.name(),
                    "category": format!("{:?}", category),
                    "description": job.description(),
                    "source_table": job.source_table(),
                    "target_table": job.target_table(),
                    "columns": job.columns().iter().map(|c| c.name()).collect::<Vec<_>>(),
                    "scope": format!("{:?}", job.scope()),
                    "null_policy": job.null_policy().as_str(),
                    "forecasts": job.regenerates_forecasts(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!(
        "\n{:<22} {:<12} {:<28} {:<10} DESCRIPTION",
        "JOB", "CATEGORY", "TABLES", "NULLS"
    );
    println!("{}", "─".repeat(112));
    for (category, job) in &jobs {
        let tables = if job.source_table() == job.target_table() {
            job.source_table().to_string()
        } else {
            format!("{} -> {}", job.source_table(), job.target_table())
        };
        println!(
            "{:<22} {:<12} {:<28} {:<10} {}",
            job.name(),
            format!("{:?}", category),
            tables,
            job.null_policy().as_str(),
            job.description()
        );
        let columns: Vec<&str> = job.columns().iter().map(|c| c.name()).collect();
        println!(
            "{:<22} columns: {} ({:?} scope)",
            "",
            columns.join(", "),
            job.scope()
        );
    }
    println!();
    Ok(())
}
