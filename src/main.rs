use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use pid_reconciler::config::Config;
use pid_reconciler::logging;
use pid_reconciler::pipeline::{Pipeline, PipelineResult};
use pid_reconciler::storage::CsvTableSink;

const CONFIG_ENV: &str = "PID_RECONCILER_CONFIG";

#[derive(Parser)]
#[command(name = "pid_reconciler")]
#[command(about = "Reconcile a PID inventory against per-datastream metadata extracts")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML config file (falls back to $PID_RECONCILER_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the run summary as JSON to this path
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    /// Directory for rolling log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the master table against the datastream extracts and write the pre-processed table
    Merge,
    /// Classify and deduplicate the pre-processed table
    PostProcess,
    /// Run merge and post-process back to back
    Run,
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => {
            info!("No config file given, using built-in defaults");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn print_result(result: &PipelineResult) {
    println!("\n📊 Results for {} ({:?}):", result.dataset, result.phase);
    println!("   Input rows: {}", result.input_rows);
    println!("   Expanded rows: {}", result.expanded_rows);
    println!("   Blanked rows: {}", result.blanked_rows);
    println!("   Rescaled rows: {}", result.rescaled_rows);
    println!("   Collection rows: {}", result.collection_rows);
    println!("   Dropped duplicates: {}", result.dropped_duplicates);
    println!("   Output rows: {}", result.output_rows);
    println!("   Output file: {}", result.output_file);
    println!("   SHA-256: {}", result.output_sha256);
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let _guard = logging::init_logging(&cli.log_dir);

    let config = load_config(cli.config)?;
    let mut sink = CsvTableSink::new(&config.output_dir);
    let pipeline = Pipeline::new(config)?;

    let outcome = match cli.command {
        Commands::Merge => {
            println!("🔄 Running merge phase...");
            pipeline.run_merge(&mut sink)
        }
        Commands::PostProcess => {
            println!("🔨 Running post-process phase...");
            pipeline.run_post_process(&mut sink)
        }
        Commands::Run => {
            println!("🚀 Running full reconciliation (merge + post-process)...");
            pipeline.run(&mut sink)
        }
    };

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            error!("Reconciliation failed: {}", e);
            println!("❌ Reconciliation failed: {}", e);
            return Err(e.into());
        }
    };

    print_result(&result);
    if let Some(report) = cli.report {
        result
            .write_report(&report)
            .with_context(|| format!("writing report to {}", report.display()))?;
        println!("   Report: {}", report.display());
    }
    println!("✅ Done");
    Ok(())
}
