//! House Explainer CLI - terminal access to the house price explanations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use house_explainer::config::{DashboardConfig, PipelineConfig, DEFAULT_HOST, DEFAULT_PORT};
use house_explainer::data::DEFAULT_DATA_DIR;
use house_explainer::models::LocalContribution;
use house_explainer::{pipeline, run_app, SmartExplainer};

const DEFAULT_TOP: usize = 15;
const DEFAULT_MAX_CONTRIB: usize = 10;

#[derive(Parser)]
#[command(name = "house-explainer-cli")]
#[command(author, version, about = "House price explanations in the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run in interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// Directory holding the dataset and its feature dictionary
    #[arg(long, env = "DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Saved explainer to use instead of training a new forest
    #[arg(long, global = true)]
    explainer: Option<PathBuf>,

    /// Number of trees when training
    #[arg(long, default_value = "200")]
    n_estimators: usize,

    /// Log pipeline progress
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dataset, model and accuracy overview
    Summary,

    /// Global feature importance
    Importance {
        /// Number of features to show
        #[arg(long, default_value_t = DEFAULT_TOP)]
        top: usize,
    },

    /// Explain the prediction of one house
    Explain {
        /// House Id
        #[arg(long)]
        id: i64,

        /// Number of contributions to show
        #[arg(long, default_value_t = DEFAULT_MAX_CONTRIB)]
        max_contrib: usize,
    },

    /// Train, compile and save the explainer as JSON
    Compile {
        #[arg(short, long, default_value = "explainer.json")]
        output: PathBuf,
    },

    /// Serve the dashboard
    Serve {
        #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
        host: String,

        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set tracing subscriber")?;
    }

    println!(
        "{}",
        format!("House Explainer CLI v{}", env!("CARGO_PKG_VERSION"))
            .cyan()
            .bold()
    );
    println!();

    if cli.interactive {
        let explainer = load_explainer(&cli)?;
        run_interactive(&explainer)?;
        return Ok(());
    }

    let Some(command) = &cli.command else {
        println!("Use --help for usage information or --interactive for interactive mode.");
        return Ok(());
    };

    match command {
        Commands::Summary => show_summary(&load_explainer(&cli)?)?,
        Commands::Importance { top } => show_importance(&load_explainer(&cli)?, *top)?,
        Commands::Explain { id, max_contrib } => {
            show_local(&load_explainer(&cli)?, *id, *max_contrib)?
        }
        Commands::Compile { output } => compile(&cli, output)?,
        Commands::Serve { host, port } => {
            let explainer = load_explainer(&cli)?;
            serve(
                explainer,
                DashboardConfig {
                    host: host.clone(),
                    port: *port,
                },
            )?;
        }
    }

    Ok(())
}

fn spinner(msg: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(msg);
    Ok(pb)
}

/// Load the saved explainer, or train and compile a new one
fn load_explainer(cli: &Cli) -> Result<SmartExplainer> {
    if let Some(path) = &cli.explainer {
        let pb = spinner("Loading explainer...")?;
        let explainer = SmartExplainer::load(path)
            .with_context(|| format!("Failed to load explainer from {:?}", path))?;
        pb.finish_and_clear();
        return Ok(explainer);
    }

    let config = PipelineConfig {
        data_dir: cli.data_dir.clone(),
        n_estimators: cli.n_estimators,
        verbose: false,
        ..Default::default()
    };

    let pb = spinner("Training forest and computing contributions...")?;
    let output = pipeline::run(&config)
        .with_context(|| format!("Pipeline failed for {:?}", config.data_dir))?;
    pb.finish_and_clear();

    println!(
        "{} {} rows, {} trees, test R2 {:.3}",
        "Trained:".green(),
        output.split.train.n_samples(),
        config.n_estimators,
        output.metrics.r2
    );
    println!();

    Ok(output.explainer)
}

fn show_summary(explainer: &SmartExplainer) -> Result<()> {
    let summary = explainer.summary()?;

    println!("{}", "Summary:".yellow().bold());
    println!("{:<22} {}", "Rows explained", summary.n_rows);
    println!(
        "{:<22} {} ({} categorical)",
        "Features",
        summary.n_features,
        summary.categorical_features.len()
    );
    println!(
        "{:<22} {} ({} trees, min leaf {})",
        "Model",
        summary.model.kind,
        summary.model.n_estimators,
        summary.model.min_samples_leaf
    );
    println!("{:<22} {:.0}", "Expected value", summary.expected_value);
    println!("{:<22} {:.0}", "Mean prediction", summary.prediction_mean);
    if let Some(oob) = summary.model.oob_score {
        println!("{:<22} {:.3}", "OOB R2", oob);
    }
    if let Some(m) = &summary.metrics {
        println!("{:<22} {:.3}", "R2", m.r2);
        println!("{:<22} {:.0}", "MAE", m.mae);
        println!("{:<22} {:.0}", "RMSE", m.rmse);
        println!("{:<22} {:.1}%", "MAPE", m.mape * 100.0);
    }
    println!(
        "{:<22} {}",
        "Compiled at",
        summary.compiled_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}

fn show_importance(explainer: &SmartExplainer, top: usize) -> Result<()> {
    let importance = explainer.features_importance()?;

    println!("{}", "Features importance:".yellow().bold());
    println!(
        "{:>4} {:<16} {:<40} {:>8} {:>8}",
        "#", "Feature", "Label", "SHAP", "MDI"
    );
    println!("{}", "-".repeat(80));

    for (rank, f) in importance.iter().take(top).enumerate() {
        println!(
            "{:>4} {:<16} {:<40} {:>7.1}% {:>7.1}%",
            rank + 1,
            f.feature,
            truncate(&f.label, 40),
            f.importance * 100.0,
            f.mdi * 100.0
        );
    }

    Ok(())
}

fn show_local(explainer: &SmartExplainer, id: i64, max_contrib: usize) -> Result<()> {
    let local = explainer
        .local_plot(id, Some(max_contrib))
        .with_context(|| format!("Failed to explain house {}", id))?;

    println!("{} {}", "House".green(), id);
    println!("{:<22} {:.0}", "Prediction", local.prediction);
    if let Some(y) = local.y_true {
        println!("{:<22} {:.0}", "Actual", y);
    }
    println!("{:<22} {:.0}", "Expected value", local.expected_value);
    println!();

    println!("{:<16} {:<20} {:>12}", "Feature", "Value", "Contribution");
    println!("{}", "-".repeat(50));
    for c in &local.contributions {
        print_contribution(c);
    }
    if let Some(other) = local.other_features {
        println!("{:<16} {:<20} {:>12.0}", "Other features", "", other);
    }

    Ok(())
}

fn print_contribution(c: &LocalContribution) {
    let value = c.value.to_string();
    let amount = format!("{:>12.0}", c.contribution);
    let amount = if c.contribution >= 0.0 {
        amount.red()
    } else {
        amount.blue()
    };
    println!("{:<16} {:<20} {}", c.feature, truncate(&value, 20), amount);
}

fn compile(cli: &Cli, output: &Path) -> Result<()> {
    let explainer = load_explainer(cli)?;
    explainer
        .save(output)
        .with_context(|| format!("Failed to save explainer to {:?}", output))?;
    println!("{} {:?}", "Saved explainer to".green(), output);
    Ok(())
}

fn serve(explainer: SmartExplainer, config: DashboardConfig) -> Result<()> {
    actix_web::rt::System::new().block_on(async move {
        let app = run_app(explainer, &config)
            .with_context(|| format!("Failed to bind dashboard to {}", config.addr()))?;
        println!("{} {}", "Dashboard running at".green(), app.url());
        println!("Press Ctrl-C to stop.");
        app.wait().await?;
        Ok::<(), anyhow::Error>(())
    })
}

fn run_interactive(explainer: &SmartExplainer) -> Result<()> {
    println!("{}", "Interactive mode".green().bold());
    println!();

    let theme = ColorfulTheme::default();

    loop {
        let options = vec![
            "Summary",
            "Features importance",
            "Explain a house",
            "Quit",
        ];

        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => {
                println!();
                show_summary(explainer)?;
                println!();
            }
            1 => {
                let top: usize = Input::with_theme(&theme)
                    .with_prompt("Number of features")
                    .default(DEFAULT_TOP)
                    .interact_text()?;

                println!();
                show_importance(explainer, top)?;
                println!();
            }
            2 => {
                let ids = explainer.ids()?;
                let first = ids.first().copied().unwrap_or_default();
                let id: i64 = Input::with_theme(&theme)
                    .with_prompt(format!("House Id ({} houses explained)", ids.len()))
                    .default(first)
                    .interact_text()?;

                println!();
                if let Err(e) = show_local(explainer, id, DEFAULT_MAX_CONTRIB) {
                    println!("{}", format!("{:#}", e).red());
                }
                println!();
            }
            3 => {
                println!("Goodbye!");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Truncate text to fit display width
fn truncate(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        text.to_string()
    } else {
        chars[..max_len.saturating_sub(1)].iter().collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Kitchen quality", 40), "Kitchen quality");
        assert_eq!(truncate("Kitchen quality", 8), "Kitchen…");
        assert_eq!(truncate("Kitchen quality", 1), "…");
        assert_eq!(truncate("Kitchen quality", 0), "…");
        assert_eq!(truncate("", 0), "");
    }
}
