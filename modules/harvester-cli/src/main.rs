//! Thin CLI shell over the harvester engine (§6), the same role the
//! teacher's `rootsignal-scout/src/main.rs` plays over `Scout::run()`: load
//! config, construct every collaborator, drive one `Orchestrator::run`,
//! write the output layout.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harvester_common::Config;
use harvester_discovery::{SearchProvider, TavilyProvider};
use harvester_evidence::EvidenceStore;
use harvester_events::{AppendEvent, EventStore};
use harvester_llm::{LlmClient, Router};
use harvester_orchestrator::Orchestrator;
use harvester_queue::AutomationQueue;
use harvester_review::ReviewStore;
use uuid::Uuid;

use harvester_cli::job::JobInput;
use harvester_cli::live_ports::LivePorts;
use harvester_cli::llm_client::{ClaudeLlmClient, NullLlmClient, OpenAiLlmClient};
use harvester_cli::output::RunLayout;

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Runs the product spec harvesting pipeline for one product")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a harvest for one job file (`inputs/{category}/products/{product_id}.json`).
    Run {
        /// Path to the job input JSON.
        job_file: PathBuf,

        /// Root directory job inputs and run outputs live under.
        #[arg(long, default_value = "inputs")]
        inputs_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    config.log_redacted();

    match cli.command {
        Commands::Run { job_file, .. } => run_job(&job_file, config).await,
    }
}

async fn run_job(job_file: &std::path::Path, config: Config) -> Result<()> {
    let raw = std::fs::read_to_string(job_file)
        .with_context(|| format!("reading job file {}", job_file.display()))?;
    let job: JobInput = serde_json::from_str(&raw).context("parsing job input")?;
    let product_id = job.product_id();
    let run_id = format!("run-{}", Uuid::new_v4());

    tracing::info!(product_id = product_id.as_str(), run_id = run_id.as_str(), "starting harvest run");

    let evidence = EvidenceStore::open(&config.store_path).await.context("opening evidence store")?;
    let review = ReviewStore::open(&config.store_path).await.context("opening review store")?;
    let queue = AutomationQueue::open(&config.store_path).await.context("opening automation queue")?;
    let events = Arc::new(EventStore::open(&config.store_path).await.context("opening event store")?);

    let search_provider: Option<Arc<dyn SearchProvider>> = config
        .search_provider_api_key
        .clone()
        .map(|key| Arc::new(TavilyProvider::new(key, reqwest::Client::new())) as Arc<dyn SearchProvider>);

    let router = build_router(&config);

    let ports = Arc::new(LivePorts::new(
        run_id.clone(),
        job.identity_lock.clone(),
        job.category.clone(),
        job.seed_urls.clone(),
        evidence,
        review,
        queue,
        router,
        search_provider,
        &config,
    ));

    let orchestrator = Orchestrator::new(ports.clone(), config.clone()).with_event_store(events.clone());
    let cancel = AtomicBool::new(false);

    events
        .append(AppendEvent::new("orchestrator", "run_requested", &run_id, serde_json::json!({
            "product_id": product_id,
            "category": job.category,
        })).with_run_id(&run_id))
        .await
        .ok();

    let summary = orchestrator
        .run(&run_id, &product_id, &cancel, wall_clock_secs)
        .await
        .context("running orchestrator")?;

    let layout = RunLayout::new(
        std::path::Path::new(&config.output_dir),
        &job.category,
        &product_id,
        &run_id,
    )?;
    layout.write_summary(&summary)?;
    layout.write_event_log(&events, &run_id).await?;
    let export = ports.export_fields(&product_id).await.context("exporting field records")?;
    layout.write_field_export(&job.category, &export)?;
    layout.write_search_profile(&ports.export_search_profile().await)?;
    layout.write_phase07_retrieval(&ports.export_phase07_retrieval(&product_id).await?)?;
    layout.write_phase08_extraction(&ports.export_phase08_extraction(&product_id).await?)?;

    if summary.status == "completed" {
        layout.update_latest_pointer(std::path::Path::new(&config.output_dir), &job.category, &product_id)?;
    }

    tracing::info!(
        run_id = run_id.as_str(),
        status = summary.status.as_str(),
        rounds = summary.rounds_completed,
        "harvest run finished"
    );

    Ok(())
}

fn build_router(config: &Config) -> Option<Router> {
    let client: Arc<dyn LlmClient> = if let Some(key) = &config.anthropic_api_key {
        Arc::new(ClaudeLlmClient::new(key.clone()))
    } else if let Some(key) = &config.openai_api_key {
        Arc::new(OpenAiLlmClient::new(key.clone()))
    } else {
        Arc::new(NullLlmClient)
    };

    Some(Router::new(LivePorts::role_configs(config), client))
}

fn wall_clock_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
