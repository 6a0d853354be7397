// External crates
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

// Local modules
use wind_power_forecast::build_info;
use wind_power_forecast::config::PipelineConfig;
use wind_power_forecast::constants::{FARM_FILE_PATTERN, RANDOM_SEED, TARGET_COLUMN};
use wind_power_forecast::util::alignment::MaskPolicy;
use wind_power_forecast::util::synthetic::write_demo_dataset;
use wind_power_forecast::workflow::run_pipeline;

#[derive(Parser)]
#[command(name = "wind_power_forecast", version, about = "Next-hour wind power forecasting model comparison")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge inputs, build features, search all models and print the comparison
    Run {
        /// Primary observation CSV (date, wp1, ...)
        #[arg(long)]
        primary: PathBuf,

        /// Directory holding the per-farm forecast CSVs
        #[arg(long)]
        forecast_dir: PathBuf,

        /// File name pattern of the farm forecast files
        #[arg(long, default_value = FARM_FILE_PATTERN)]
        pattern: String,

        /// Power column to forecast one hour ahead
        #[arg(long, default_value = TARGET_COLUMN)]
        target: String,

        #[arg(long, value_enum, default_value_t = MaskPolicy::ShiftThenDrop)]
        mask_policy: MaskPolicy,

        /// Write a JSON report with every searched candidate here
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Single-candidate grids and short LSTM training
        #[arg(long)]
        quick: bool,
    },
    /// Write a synthetic primary table and farm forecast files
    Demo {
        #[arg(long, default_value = "data/demo")]
        out_dir: PathBuf,

        /// Hours of data
        #[arg(long, default_value_t = 720)]
        rows: usize,

        #[arg(long, default_value_t = 3)]
        farms: usize,

        #[arg(long, default_value_t = RANDOM_SEED)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("{}", build_info::describe());

    match Cli::parse().command {
        Command::Run {
            primary,
            forecast_dir,
            pattern,
            target,
            mask_policy,
            report_dir,
            quick,
        } => {
            let mut config = if quick {
                PipelineConfig::quick()
            } else {
                PipelineConfig::default()
            }
            .with_target(&target);
            config.farm_pattern = pattern;
            config.mask_policy = mask_policy;

            let report = run_pipeline(&primary, &forecast_dir, &config)?;
            println!("{}", report.search_summary());
            println!("{}", report.comparison);
            if let Some(best) = report.comparison.best_model() {
                println!("Best model: {} (MAE {:.4})", best.model, best.mae);
            }

            if let Some(dir) = report_dir {
                let path = report.save(&dir)?;
                info!("Report written to {}", path.display());
            }
        }
        Command::Demo {
            out_dir,
            rows,
            farms,
            seed,
        } => {
            let paths = write_demo_dataset(&out_dir, rows, farms, seed)?;
            println!(
                "Demo data written. Run with:\n  wind_power_forecast run --primary {} --forecast-dir {}",
                paths.primary.display(),
                paths.forecast_dir.display()
            );
        }
    }

    Ok(())
}
