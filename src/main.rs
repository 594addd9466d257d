use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use house_explainer::config::{DashboardConfig, PipelineConfig, DEFAULT_HOST, DEFAULT_PORT};
use house_explainer::data::DEFAULT_DATA_DIR;
use house_explainer::{pipeline, run_app};

/// Train the house price forest and serve its explanations
#[derive(Parser)]
#[command(name = "house-explainer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the dataset and its feature dictionary
    #[arg(long, env = "DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Dashboard host
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Dashboard port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Do not print the dataset preview and feature dictionary
    #[arg(short, long)]
    quiet: bool,

    /// Exit after compiling instead of serving the dashboard
    #[arg(long)]
    no_dashboard: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let args = Args::parse();

    let config = PipelineConfig {
        data_dir: args.data_dir,
        verbose: !args.quiet,
        ..Default::default()
    };

    info!("Loading house prices from {:?}", config.data_dir);
    let output = pipeline::run(&config).context("Pipeline failed")?;

    if args.no_dashboard {
        info!("Dashboard disabled, exiting");
        return Ok(());
    }

    let dashboard = DashboardConfig {
        host: args.host,
        port: args.port,
    };
    let app = run_app(output.explainer, &dashboard)
        .with_context(|| format!("Failed to bind dashboard to {}", dashboard.addr()))?;

    info!("Open {} in a browser, Ctrl-C to stop", app.url());
    app.wait().await?;

    Ok(())
}
