use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod catalog;
mod charts;
mod cleaning;
mod config;
mod dfg;
mod discovery;
mod error;
mod event_log;
mod export;
mod extract;
mod ingest;
mod models;
mod pipeline;
mod pnml;
mod report;
mod schedule;
mod slicing;
mod temporal;
mod weekly;
mod xes;

use config::{ProjectPaths, Settings};
use discovery::{CommandBackend, Miner, MinerParams};
use error::PipelineError;

#[derive(Parser)]
#[command(name = "lms-pm")]
#[command(about = "Process mining pipeline for LMS activity logs", long_about = None)]
struct Cli {
    /// Project root holding data/ and figures/
    #[arg(long, global = true, env = "PM_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, label and slice the raw LMS export
    Preprocess {
        /// Raw export (.xlsx or .csv); falls back to INPUT_XLSX
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Build the XES event logs and weekly tables
    EventLogs {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Descriptive statistics and distribution tables
    Analyze {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Discover a process model and score it
    Discover {
        #[arg(long, value_enum, default_value_t = Miner::Inductive)]
        miner: Miner,
        #[arg(long)]
        xes: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 0.5)]
        dependency: f64,
        #[arg(long, default_value_t = 0.65)]
        and_threshold: f64,
        #[arg(long, default_value_t = 0.5)]
        loop_two: f64,
        #[arg(long)]
        skip_metrics: bool,
    },
    /// Directly-follows graph with frequencies and median durations
    Dfg {
        #[arg(long)]
        xes: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    let settings = Settings::from_env().context("invalid environment configuration")?;
    let paths = ProjectPaths::new(&cli.base_dir);
    paths
        .ensure()
        .with_context(|| format!("failed to prepare {}", cli.base_dir.display()))?;

    match cli.command {
        Commands::Preprocess { input } => {
            let summary = pipeline::run_preprocess(&paths, &settings, input.as_deref())?;
            println!(
                "Preprocessed {} rows from {}: {} kept, {} staff rows split off, {} exam rows reclassified, {} loop-free rows.",
                summary.raw_rows,
                summary.input.display(),
                summary.remaining_rows,
                summary.excluded_rows,
                summary.reclassified,
                summary.loop_free_rows
            );
        }
        Commands::EventLogs { input } => {
            let logs = pipeline::run_event_logs(&paths, input.as_deref())?;
            println!("Event logs written:");
            for log in logs {
                println!("- {} ({} traces, {} events)", log.path.display(), log.cases, log.events);
            }
        }
        Commands::Analyze { input, out } => {
            let report = pipeline::run_analysis(&paths, input.as_deref(), out.as_deref())?;
            println!("Report written to {}.", report.display());
        }
        Commands::Discover {
            miner,
            xes,
            out,
            dependency,
            and_threshold,
            loop_two,
            skip_metrics,
        } => {
            let backend = settings
                .backend_command
                .as_deref()
                .and_then(CommandBackend::from_command_line)
                .ok_or_else(|| PipelineError::Config {
                    key: "PM_BACKEND".to_string(),
                    message: "set it to the discovery backend command".to_string(),
                })?;
            let options = pipeline::DiscoverOptions {
                miner,
                xes,
                out,
                params: MinerParams {
                    dependency_threshold: dependency,
                    and_threshold,
                    loop_two_threshold: loop_two,
                },
                skip_metrics,
            };
            let summary = pipeline::run_discovery(&paths, &options, &backend)
                .with_context(|| format!("{miner} discovery failed"))?;

            if let Some(quality) = &summary.quality {
                println!("Quality of the {miner} model:");
                for (name, value) in quality.values() {
                    println!("- {name}: {value:.4}");
                }
            }
            println!("Outputs in {}:", summary.out_dir.display());
            for file in &summary.files {
                println!("- {}", file.display());
            }
        }
        Commands::Dfg { xes, out } => {
            let (dfg, files) = pipeline::run_dfg(&paths, xes.as_deref(), out.as_deref())?;
            println!(
                "Directly-follows graph: {} edges, {} start and {} end activities.",
                dfg.edges.len(),
                dfg.start_activities.len(),
                dfg.end_activities.len()
            );
            for file in files {
                println!("- {}", file.display());
            }
        }
    }

    Ok(())
}
