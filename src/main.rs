use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};

mod clean;
mod config;
mod dashboard;
mod index;
mod ingest;
mod models;
mod normalize;
mod pipeline;
mod snapshot;
mod stats;
mod visibility;

use config::PipelineConfig;

#[derive(Parser)]
#[command(name = "maintenance-stats")]
#[command(about = "Equipment maintenance reconciliation and statistics pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the raw sources into the database snapshots
    BuildDb {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Report serials referenced by the transaction logs but absent from the registry
    Audit {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Compute the statistics snapshots from the database snapshots
    Stats {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Run the full pipeline: database snapshots, then every statistics artifact
    Run {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let run_stamp = snapshot::timestamp(Utc::now());

    match cli.command {
        Commands::BuildDb { data_dir, config } => {
            let config = PipelineConfig::load(config.as_deref())?;
            let data = pipeline::build_database(&data_dir, &config, &run_stamp)?;
            print_build_summary(&data);
            let written = pipeline::write_database(&data_dir, &data, &run_stamp)?;
            println!(
                "Wrote {} database snapshots to {}.",
                written.len(),
                data_dir.join(pipeline::DB_DIR).display()
            );
        }
        Commands::Audit { data_dir, config } => {
            let config = PipelineConfig::load(config.as_deref())?;
            let data = pipeline::build_database(&data_dir, &config, &run_stamp)?;
            print_audit(&data);
        }
        Commands::Stats { data_dir } => {
            run_stats(&data_dir, &run_stamp)?;
        }
        Commands::Run { data_dir, config } => {
            let config = PipelineConfig::load(config.as_deref())?;
            let data = pipeline::build_database(&data_dir, &config, &run_stamp)?;
            print_build_summary(&data);
            let written = pipeline::write_database(&data_dir, &data, &run_stamp)?;
            println!(
                "Wrote {} database snapshots to {}.",
                written.len(),
                data_dir.join(pipeline::DB_DIR).display()
            );
            run_stats(&data_dir, &run_stamp)?;
        }
    }

    Ok(())
}

fn run_stats(data_dir: &Path, run_stamp: &str) -> anyhow::Result<()> {
    let db = pipeline::load_database(data_dir);
    if db.sources.is_empty() {
        println!("No database snapshots found; statistics will be empty.");
    }
    let written = pipeline::write_stats(data_dir, &db, run_stamp)?;
    println!(
        "Wrote {} statistics snapshots to {}.",
        written.len(),
        data_dir.join(pipeline::STATS_DIR).display()
    );
    Ok(())
}

fn print_build_summary(data: &pipeline::NormalizedData) {
    println!("Sources:");
    for report in &data.reports {
        println!("  {report}");
    }
    println!(
        "Registry: {} equipment records ({} synthesized for orphan serials), \
         {} updated from the movement log.",
        data.equipment.len(),
        data.placeholders_added,
        data.movements_folded
    );
    println!(
        "Records: {} repairs, {} calibrations, {} movements.",
        data.repairs.len(),
        data.calibrations.len(),
        data.movements.len()
    );
}

fn print_audit(data: &pipeline::NormalizedData) {
    println!(
        "Serials referenced by transaction logs: {}",
        data.audit.referenced.len()
    );
    println!("  present in the registry: {}", data.audit.present.len());
    println!("  missing from the registry: {}", data.audit.missing.len());
    if data.audit.missing.is_empty() {
        println!("Every referenced serial exists in the registry.");
        return;
    }
    println!("Missing serials (placeholders were synthesized):");
    for serial in &data.audit.missing {
        let label = data
            .equipment
            .iter()
            .find(|e| &e.serial == serial)
            .map(|e| e.category.as_str())
            .filter(|c| !c.is_empty())
            .unwrap_or("no product label");
        println!("  - {serial} ({label})");
    }
}
