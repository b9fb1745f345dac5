//! RepScore CLI
//!
//! The `repscore` command routes tasks to tool providers by live reputation
//! and folds execution telemetry back into their scores.
//!
//! ## Commands
//!
//! - `discover`: List providers of a category above a threshold
//! - `reputation`: Show one provider's current decayed score
//! - `route`: Pick a provider for a category and goal
//! - `feedback`: Submit one telemetry record
//! - `audit`: Show stored and live state for every provider
//! - `simulate`: Run seeded simulated tasks through the full loop
//! - `catalog`: Show the provider catalog

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use repscore_core::{
    render_recommendation, render_weights, AgentClient, Category, GoalDescriptor,
    Level as GoalLevel, Outcome, ProviderId, ProviderRegistry, RepScoreConfig, RepScoreError,
    RepScoreService, SimulatedExecutor, Telemetry,
};
use repscore_state::{JsonSnapshotFile, SnapshotPersister};

#[derive(Parser)]
#[command(name = "repscore")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reputation-aware routing for interchangeable tool providers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and JSON command output
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file (REPSCORE_<OPTION> variables override it)
    #[arg(long, global = true, env = "REPSCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Provider catalog (TOML or JSON); the reference catalog when omitted
    #[arg(long, global = true, env = "REPSCORE_CATALOG")]
    catalog: Option<PathBuf>,

    /// Snapshot file to hydrate from and persist committed updates to
    #[arg(long, global = true, env = "REPSCORE_STATE")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List providers of a category whose live score reaches a threshold
    Discover {
        /// Task category (e.g. image_gen, MATH_COMPUTE)
        category: Category,

        /// Minimum live score (default: configured routing threshold)
        #[arg(short, long)]
        min: Option<f64>,

        /// Rank by confidence-adjusted scores
        #[arg(long)]
        conservative: bool,
    },

    /// Show a provider's current decayed reputation
    Reputation {
        /// Provider id
        provider: String,
    },

    /// Select a provider for a category under a goal
    Route {
        /// Task category
        category: Category,

        #[command(flatten)]
        goal: GoalArgs,

        /// Print the policy and recommendation as prose
        #[arg(long)]
        explain: bool,
    },

    /// Submit execution telemetry for a provider
    Feedback {
        /// Provider id
        provider: String,

        /// Telemetry JSON file (instead of the individual flags)
        #[arg(long, conflicts_with_all = ["outcome", "latency", "cost", "confidence"])]
        telemetry: Option<PathBuf>,

        /// success, error or timeout
        #[arg(long)]
        outcome: Option<Outcome>,

        /// Observed latency in seconds
        #[arg(long)]
        latency: Option<f64>,

        /// Cost incurred
        #[arg(long)]
        cost: Option<f64>,

        /// Confidence in [0, 1]
        #[arg(long)]
        confidence: Option<f64>,
    },

    /// Show stored and live reputation for every provider
    Audit,

    /// Run simulated tasks through route, execute and feedback
    Simulate {
        /// Task category
        category: Category,

        #[command(flatten)]
        goal: GoalArgs,

        /// Total number of tasks
        #[arg(short, long, default_value = "20")]
        tasks: usize,

        /// Concurrent agent workers
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Seed for the simulated providers
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Show the provider catalog
    Catalog,
}

#[derive(clap::Args, Debug, Clone)]
struct GoalArgs {
    /// Risk tolerance: low, medium or high
    #[arg(long, default_value = "medium")]
    risk: GoalLevel,

    /// Latency priority: low, medium or high
    #[arg(long, default_value = "medium")]
    latency_priority: GoalLevel,

    /// Accuracy priority: low, medium or high
    #[arg(long, default_value = "medium")]
    accuracy_priority: GoalLevel,
}

impl GoalArgs {
    fn descriptor(&self) -> GoalDescriptor {
        GoalDescriptor::new(self.risk, self.latency_priority, self.accuracy_priority)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    repscore_core::init_tracing(cli.json, level);

    let service = Arc::new(
        open_service(
            cli.config.as_deref(),
            cli.catalog.as_deref(),
            cli.state.as_deref(),
        )
        .await?,
    );
    let outcome = run_command(&service, cli.command, cli.json).await;
    finish(service, outcome).await
}

async fn run_command(service: &Arc<RepScoreService>, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Discover {
            category,
            min,
            conservative,
        } => cmd_discover(service, category, min, conservative, json).await?,
        Commands::Reputation { provider } => cmd_reputation(service, &provider, json).await?,
        Commands::Route {
            category,
            goal,
            explain,
        } => cmd_route(service, category, goal.descriptor(), explain, json).await?,
        Commands::Feedback {
            provider,
            telemetry,
            outcome,
            latency,
            cost,
            confidence,
        } => {
            let id = ProviderId::new(provider);
            let telemetry = match telemetry {
                Some(path) => read_telemetry(&id, &path)?,
                None => telemetry_from_flags(&id, outcome, latency, cost, confidence)?,
            };
            cmd_feedback(service, &id, &telemetry, json).await?
        }
        Commands::Audit => cmd_audit(service, json).await?,
        Commands::Simulate {
            category,
            goal,
            tasks,
            workers,
            seed,
        } => {
            cmd_simulate(
                service,
                category,
                goal.descriptor(),
                tasks,
                workers,
                seed,
                json,
            )
            .await?
        }
        Commands::Catalog => cmd_catalog(service, json)?,
    }
    Ok(())
}

/// Flush queued state whether or not the command succeeded. A command error
/// takes precedence over a flush error.
async fn finish(service: Arc<RepScoreService>, outcome: Result<()>) -> Result<()> {
    let flushed = match Arc::try_unwrap(service) {
        Ok(service) => service
            .shutdown()
            .await
            .context("Failed to flush reputation state"),
        Err(_) => Err(anyhow!("service is still shared after the command finished")),
    };
    match (outcome, flushed) {
        (Err(err), Err(flush_err)) => {
            warn!(error = %format!("{flush_err:#}"), "state flush failed after command error");
            Err(err)
        }
        (outcome, flushed) => outcome.and(flushed),
    }
}

/// Load configuration: file (or defaults), then environment overrides.
fn load_config(path: Option<&Path>) -> Result<RepScoreConfig> {
    let config = match path {
        Some(path) => RepScoreConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RepScoreConfig::default(),
    };
    config
        .with_env_overrides()
        .context("Invalid REPSCORE_* environment override")
}

fn load_registry(path: Option<&Path>) -> Result<ProviderRegistry> {
    match path {
        Some(path) => ProviderRegistry::from_path(path)
            .with_context(|| format!("Failed to load catalog {}", path.display())),
        None => Ok(ProviderRegistry::reference_catalog()),
    }
}

/// Build the service, hydrating from and persisting to `state` when given.
async fn open_service(
    config_path: Option<&Path>,
    catalog_path: Option<&Path>,
    state: Option<&Path>,
) -> Result<RepScoreService> {
    let config = load_config(config_path)?;
    let registry = load_registry(catalog_path)?;
    let now = Utc::now();

    let Some(state) = state else {
        return RepScoreService::new(config, registry, now)
            .await
            .context("Failed to start RepScore");
    };

    let snapshot = JsonSnapshotFile::open(state)
        .with_context(|| format!("Failed to read state file {}", state.display()))?;
    let capacity = config.telemetry_log_capacity;
    let service = RepScoreService::hydrate(config, registry, &snapshot, now)
        .await
        .context("Failed to hydrate RepScore state")?;
    info!(path = %state.display(), "persisting committed updates");
    Ok(service.with_persister(SnapshotPersister::spawn(snapshot, capacity)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_discover(
    service: &RepScoreService,
    category: Category,
    min: Option<f64>,
    conservative: bool,
    json: bool,
) -> Result<()> {
    let threshold = min.unwrap_or(service.config().min_reputation_threshold);
    let candidates = service
        .discover_with(category, threshold, conservative, Utc::now())
        .await?;

    if json {
        return print_json(&candidates);
    }
    if candidates.is_empty() {
        println!("No {} provider at or above {:.2}", category, threshold);
        return Ok(());
    }
    println!("{} providers at or above {:.2}:", category, threshold);
    for c in &candidates {
        println!(
            "  {:<20} live {:.4}  stored {:.4}  interactions {}",
            c.provider.id, c.live_score, c.stored_score, c.interaction_count
        );
    }
    Ok(())
}

async fn cmd_reputation(service: &RepScoreService, provider: &str, json: bool) -> Result<()> {
    let id = ProviderId::from(provider);
    let score = service.get_reputation(&id, Utc::now()).await?;
    if json {
        return print_json(&serde_json::json!({ "provider_id": id, "score": score }));
    }
    println!("{} {:.4}", id, score);
    Ok(())
}

async fn cmd_route(
    service: &RepScoreService,
    category: Category,
    goal: GoalDescriptor,
    explain: bool,
    json: bool,
) -> Result<()> {
    let decision = match service.route(category, goal, Utc::now()).await {
        Ok(decision) => decision,
        Err(e @ RepScoreError::NoEligibleProvider { .. }) => {
            return Err(e)
                .context("Routing blocked; relax the goal or wait for reputation to recover");
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        return print_json(&decision);
    }
    println!("Selected: {}", decision.provider_id);
    for (rank, r) in decision.selection.ranking().iter().enumerate() {
        println!(
            "  {}. {:<20} policy {:.4}  live {:.4}  accuracy {:.2}  latency {:.2}",
            rank + 1,
            r.provider_id(),
            r.policy_score,
            r.candidate.live_score,
            r.accuracy_estimate,
            r.normalized_latency
        );
    }
    if explain {
        println!("{}", render_weights(&decision.weights));
        println!(
            "{}",
            render_recommendation(decision.selection.ranking(), service.config())
        );
    }
    Ok(())
}

fn read_telemetry(provider_id: &ProviderId, path: &Path) -> Result<Telemetry> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read telemetry file {}", path.display()))?;
    Ok(Telemetry::from_json(provider_id, &raw)?)
}

fn telemetry_from_flags(
    provider_id: &ProviderId,
    outcome: Option<Outcome>,
    latency: Option<f64>,
    cost: Option<f64>,
    confidence: Option<f64>,
) -> Result<Telemetry> {
    let (Some(outcome), Some(latency), Some(cost), Some(confidence)) =
        (outcome, latency, cost, confidence)
    else {
        bail!("feedback needs --telemetry or all of --outcome, --latency, --cost, --confidence");
    };
    Ok(Telemetry::new(
        provider_id.clone(),
        Utc::now(),
        outcome,
        latency,
        cost,
        confidence,
    ))
}

async fn cmd_feedback(
    service: &RepScoreService,
    provider_id: &ProviderId,
    telemetry: &Telemetry,
    json: bool,
) -> Result<()> {
    let receipt = service
        .submit_feedback(provider_id, telemetry)
        .await
        .with_context(|| format!("Feedback for {} rejected", provider_id))?;
    if json {
        return print_json(&receipt);
    }
    println!(
        "{}: {:.4} -> {:.4} (raw {:.4}, interactions {})",
        receipt.provider_id,
        receipt.prior_score,
        receipt.new_score,
        receipt.raw_score,
        receipt.interaction_count
    );
    Ok(())
}

async fn cmd_audit(service: &RepScoreService, json: bool) -> Result<()> {
    let entries = service.audit(Utc::now()).await?;
    if json {
        return print_json(&entries);
    }
    for e in &entries {
        println!(
            "{:<20} {:<16} stored {:.4}  live {:.4}  n={:<4} {}",
            e.provider_id,
            e.category,
            e.stored_score,
            e.live_score,
            e.interaction_count,
            if e.selectable { "selectable" } else { "blocked" }
        );
    }
    Ok(())
}

/// Aggregate of a simulation run.
#[derive(Debug, Default, Serialize)]
struct SimulationSummary {
    completed: usize,
    blocked: usize,
    provider_failures: usize,
    by_provider: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
struct WorkerTally {
    completed: usize,
    blocked: usize,
    provider_failures: usize,
    by_provider: BTreeMap<String, usize>,
}

/// Run `tasks` simulated tasks split over `workers` concurrent agents.
async fn run_simulation(
    service: &Arc<RepScoreService>,
    executor: Arc<SimulatedExecutor>,
    category: Category,
    goal: GoalDescriptor,
    tasks: usize,
    workers: usize,
) -> Result<SimulationSummary> {
    let workers = workers.max(1);
    let mut handles = Vec::with_capacity(workers);
    for w in 0..workers {
        let share = tasks / workers + usize::from(w < tasks % workers);
        let client = AgentClient::new(service.clone(), executor.clone());
        handles.push(tokio::spawn(async move {
            let mut tally = WorkerTally::default();
            for _ in 0..share {
                match client.execute_task(category, goal, Utc::now()).await {
                    Ok(report) => {
                        tally.completed += 1;
                        if !report.outcome().is_success() {
                            tally.provider_failures += 1;
                        }
                        *tally
                            .by_provider
                            .entry(report.provider_id.to_string())
                            .or_default() += 1;
                    }
                    Err(RepScoreError::NoEligibleProvider { .. }) => tally.blocked += 1,
                    Err(e) => return Err(e),
                }
            }
            Ok(tally)
        }));
    }

    let mut summary = SimulationSummary::default();
    for joined in futures::future::join_all(handles).await {
        let tally = joined.context("simulation worker panicked")??;
        summary.completed += tally.completed;
        summary.blocked += tally.blocked;
        summary.provider_failures += tally.provider_failures;
        for (id, n) in tally.by_provider {
            *summary.by_provider.entry(id).or_default() += n;
        }
    }
    Ok(summary)
}

async fn cmd_simulate(
    service: &Arc<RepScoreService>,
    category: Category,
    goal: GoalDescriptor,
    tasks: usize,
    workers: usize,
    seed: u64,
    json: bool,
) -> Result<()> {
    let executor = Arc::new(SimulatedExecutor::new(
        service.registry(),
        service.config().execution_timeout_secs,
        seed,
    ));
    let summary = run_simulation(service, executor, category, goal, tasks, workers).await?;

    if json {
        return print_json(&summary);
    }
    println!(
        "{} tasks: {} completed ({} provider failures), {} blocked",
        tasks, summary.completed, summary.provider_failures, summary.blocked
    );
    for (id, n) in &summary.by_provider {
        let score = service
            .get_reputation(&ProviderId::from(id.as_str()), Utc::now())
            .await?;
        println!("  {:<20} {:>4} tasks  now {:.4}", id, n, score);
    }
    Ok(())
}

fn cmd_catalog(service: &RepScoreService, json: bool) -> Result<()> {
    let registry = service.registry();
    if json {
        let providers: Vec<_> = registry.iter().collect();
        return print_json(&providers);
    }
    let default_seed = service.config().default_initial_score;
    for category in Category::ALL {
        let providers = registry.by_category(category);
        if providers.is_empty() {
            continue;
        }
        let avg = registry.average_cost(category).unwrap_or_default();
        println!("{} (average cost {:.4})", category, avg);
        for p in providers {
            println!(
                "  {:<20} cost {:.4}  error {:.2}  latency {:.2}s  seed {:.2}",
                p.id,
                p.cost_per_unit,
                p.base_error_rate,
                p.base_avg_latency,
                p.initial_score.unwrap_or(default_seed)
            );
        }
    }
    Ok(())
}
