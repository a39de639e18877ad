use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use schedule_opt::Scheduler;
use schedule_opt::day_ahead::service::router;
use schedule_opt::general::parameters::ParameterSource;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve day-ahead schedules over HTTP", long_about = None)]
struct Opt {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,
    #[arg(long, default_value_t = 8000)]
    port: u16,
    /// Directory with model.json and the optional scheduler.toml and parameters.env
    #[arg(long, default_value = "opt")]
    config_dir: PathBuf,
    /// Parameter file (`key=value` lines) merged over `<config_dir>/parameters.env`
    #[arg(long)]
    parameters: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = Opt::parse();
    let mut scheduler = Scheduler::with_lp_model(&opts.config_dir)
        .with_context(|| {
            format!("failed to load configuration from {}", opts.config_dir.display())
        })?;
    if let Some(path) = &opts.parameters {
        let source = ParameterSource::load(path)?;
        info!(path = %path.display(), count = source.parameters.len(), "Loaded parameters");
        scheduler = scheduler.with_parameter_overlay(source);
    }

    let app = router(Arc::new(scheduler));
    let addr = format!("{}:{}", opts.bind, opts.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Schedule server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
