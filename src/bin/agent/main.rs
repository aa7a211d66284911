mod brain;
mod console;
mod dom;
mod face;
mod hands;
mod narrator;
mod types;

use anyhow::{Context, Result};
use cart_agent::config::OperatorPanel;
use cart_agent::price::format_usd;
use cart_agent::{
    Configuration, ExecutionStrategy, NarrativeStrategy, OperatorGate, ScriptedStrategy,
    SiteProfile, StrategyKind, TaskRequest, TaskResult,
};
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Check a shopping cart against a spending threshold.
#[derive(Debug, Parser)]
#[command(name = "agent", version)]
struct Cli {
    /// Configuration file (default: ./cart-agent.toml, then the user config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Spending limit in dollars.
    #[arg(long)]
    threshold: Option<f64>,

    /// Free-text goal; a dollar amount in it sets the threshold.
    #[arg(long)]
    goal: Option<String>,

    /// Site profile JSON (default: built-in Amazon profile).
    #[arg(long)]
    profile: Option<PathBuf>,

    #[arg(long)]
    headless: bool,

    /// Print the result as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(result) if result.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<TaskResult> {
    let mut config = Configuration::discover(cli.config.as_deref())?;
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    if let Some(profile) = cli.profile {
        config.profile = Some(profile);
    }
    if cli.headless {
        config.browser.headless = true;
    }
    config.validate()?;

    let profile = match &config.profile {
        Some(path) => SiteProfile::load(path)
            .with_context(|| format!("loading profile {}", path.display()))?,
        None => SiteProfile::builtin()?,
    };
    info!(
        strategy = config.strategy.as_str(),
        profile = %profile.name,
        threshold = config.threshold,
        "cart agent starting"
    );

    let (gate, events): (Arc<dyn OperatorGate>, _) = match config.operator.panel {
        OperatorPanel::Web => {
            let (gate, events) = face::start_server(config.operator.port).await?.gate();
            (Arc::new(gate), Some(events))
        }
        OperatorPanel::Console => (Arc::new(console::ConsoleGate), None),
    };

    let mut strategy: Box<dyn ExecutionStrategy> = match config.strategy {
        StrategyKind::Scripted => {
            let browser = config.browser.clone();
            let session = tokio::task::spawn_blocking(move || hands::BrowserSession::launch(&browser))
                .await
                .context("browser launch panicked")??;
            Box::new(ScriptedStrategy::new(
                &config,
                Arc::new(profile),
                Arc::new(session),
                gate,
            ))
        }
        StrategyKind::Narrative => {
            let brain = brain::Brain::new(&config.llm)?;
            let start_url = profile
                .url_of(&profile.start_page)
                .unwrap_or_default()
                .to_string();
            let agent =
                narrator::BrowserAgent::new(config.browser.clone(), brain, config.llm.max_steps, events);
            Box::new(NarrativeStrategy::new(agent, start_url, config.threshold))
        }
    };

    strategy.start().await?;
    let request = TaskRequest {
        goal: cli.goal,
        threshold: cli.threshold,
    };
    let result = strategy.execute_task(&request).await;
    if let Err(e) = strategy.close().await {
        warn!(error = %e, "strategy did not close cleanly");
    }

    if cli.json {
        println!("{}", result.to_json()?);
    } else {
        print_report(&result);
    }
    Ok(result)
}

fn print_report(result: &TaskResult) {
    let amount = |key: &str| {
        result
            .get(key)
            .and_then(|v| v.as_f64())
            .map(format_usd)
            .unwrap_or_else(|| "-".into())
    };

    println!("{}", if result.success { "OK" } else { "FAILED" });
    println!("  {}", result.message);
    if let Some(snapshot) = &result.snapshot {
        for item in snapshot.items() {
            println!("  - {} ({})", item.name, format_usd(item.price));
        }
    }
    println!("  total:     {}", amount("total"));
    println!("  threshold: {}", amount("threshold"));
    println!("  action:    {}", result.action_taken().unwrap_or("-"));
}
