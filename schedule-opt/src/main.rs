use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use schedule_opt::Scheduler;
use schedule_opt::day_ahead::plot::plot_schedule;
use schedule_opt::day_ahead::replay::replay_log_file;
use schedule_opt::general::parameters::ParameterSource;
use schedule_opt::general::settings::StartTimePolicy;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay a logged day-ahead scheduling request",
    long_about = None
)]
struct Cli {
    /// Log file containing a `===== REQUEST =====` block
    request_file: PathBuf,
    /// Directory with model.json and the optional scheduler.toml and parameters.env
    #[arg(long, default_value = "opt")]
    config_dir: PathBuf,
    /// Parameter file (`key=value` lines) merged over `<config_dir>/parameters.env`
    #[arg(long)]
    parameters: Option<PathBuf>,
    /// Write a PNG plot of the schedule
    #[arg(long)]
    plot: Option<PathBuf>,
    /// Reject requests that do not start at midnight
    #[arg(long)]
    require_midnight: bool,
    /// Only return the horizon covered by the request data
    #[arg(long)]
    trim_to_input: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if !cli.request_file.is_file() {
        eprintln!("ERROR: Request file not found: {}", cli.request_file.display());
        process::exit(1);
    }

    let mut scheduler = Scheduler::with_lp_model(&cli.config_dir)
        .with_context(|| {
            format!("failed to load configuration from {}", cli.config_dir.display())
        })?;
    let mut settings = scheduler.settings().clone();
    if cli.require_midnight {
        settings.start_time_policy = StartTimePolicy::RequireMidnight;
    }
    settings.trim_to_input |= cli.trim_to_input;
    scheduler = scheduler.with_settings(settings);
    if let Some(path) = &cli.parameters {
        let source = ParameterSource::load(path)?;
        tracing::info!("Loaded {} parameters from {}", source.parameters.len(), path.display());
        scheduler = scheduler.with_parameter_overlay(source);
    }

    let result = replay_log_file(&cli.request_file, &scheduler)
        .with_context(|| format!("failed to replay {}", cli.request_file.display()))?;
    println!("{}", result);

    if let Some(path) = &cli.plot {
        plot_schedule(&result, path)
            .map_err(|e| anyhow::anyhow!("failed to plot schedule: {}", e))?;
    }
    Ok(())
}
