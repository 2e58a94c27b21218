mod dom;
mod face;
mod hands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use dotenvy::dotenv;
use plan_engine::{
    Browser, BroadcastSink, EngineConfig, KeywordDecider, Plan, PlanExecutor, Session, TracingSink,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::hands::{ChromeBrowser, LaunchSettings};

/// Drive a Chrome tab through typed navigate/click/type plans.
#[derive(Debug, Parser)]
#[command(name = "agent", version)]
struct Cli {
    /// Run this plan file once, print the outcome as JSON and exit.
    #[arg(long, value_name = "FILE")]
    plan: Option<PathBuf>,

    /// First port to try for the control API.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    #[arg(long)]
    headless: bool,

    /// DevTools endpoint of a running Chrome to attach to.
    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:9222")]
    attach: String,

    /// Always launch a fresh Chrome, even if one is listening.
    #[arg(long)]
    no_attach: bool,

    #[arg(long, default_value = "https://www.google.com")]
    start_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;

    let settings = LaunchSettings {
        attach_url: (!cli.no_attach).then(|| cli.attach.clone()),
        headless: cli.headless,
    };
    info!("launching Chrome");
    let browser = tokio::task::spawn_blocking(move || ChromeBrowser::launch(&settings))
        .await
        .map_err(|e| anyhow!("Browser launch panicked: {e}"))??;

    browser
        .navigate(&cli.start_url, config.navigate_timeout)
        .await
        .with_context(|| format!("opening {}", cli.start_url))?;

    let session = Session::new(browser.clone(), Arc::new(KeywordDecider), config);

    match cli.plan {
        Some(path) => run_once(session, &path).await,
        None => serve(session, browser, cli.port).await,
    }
}

async fn run_once(mut session: Session<ChromeBrowser>, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading plan {}", path.display()))?;
    let plan = Plan::from_json(&raw)?;

    let outcome = session.execute(&plan, &TracingSink).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_completed() {
        bail!("plan did not complete");
    }
    Ok(())
}

/// Accept plans over HTTP and run them one at a time on the single session.
async fn serve(
    mut session: Session<ChromeBrowser>,
    browser: ChromeBrowser,
    port: u16,
) -> Result<()> {
    let (plan_tx, mut plan_rx) = mpsc::channel::<face::QueuedPlan>(1);
    let (event_tx, _) = broadcast::channel(64);
    let events = BroadcastSink::new(event_tx);

    face::start_server(
        port,
        face::AppState {
            plan_tx,
            events: events.clone(),
            cancel: face::CancelScope::default(),
            browser,
        },
    )
    .await?;

    info!("waiting for plans");
    while let Some((plan, token)) = plan_rx.recv().await {
        let outcome = PlanExecutor::new()
            .with_cancellation(token)
            .run(&mut session, &plan, &events)
            .await;
        if !outcome.is_completed() {
            warn!(?outcome, "plan did not complete");
        }
    }

    Ok(())
}
