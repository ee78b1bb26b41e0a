//! cohort: condition lease server and session simulator
//!
//! `cohort serve` runs the lease API over the condition pool.
//! `cohort provision` loads condition records into the pool out of band.
//! `cohort simulate` drives scripted participants through full sessions,
//! either in-process or against a running server.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use cohort::client::{
    ContentSource, FileContent, HttpContent, HttpLeaseClient, HttpSessionSink, LeaseService,
    LocalLeases,
};
use cohort::participant::{run_session, Script};
use cohort::server::{serve, AppState};
use cohort::session::SessionSink;
use cohort::store::ProvisionRecord;
use cohort::{Config, LeaseStore, SessionOutcome, TimelineController};

#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Condition leasing and trial sequencing for online betting studies")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cohort.toml")]
    config: PathBuf,

    /// Data directory (overrides config file)
    #[arg(short, long, env = "COHORT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP port (overrides config file)
    #[arg(long, env = "COHORT_HTTP_PORT")]
    http_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the lease API (default)
    Serve,

    /// Insert condition records from a JSON array of {condition_id, trial_order}
    Provision {
        file: PathBuf,
    },

    /// Print pool counters and outstanding leases
    Status,

    /// Run scripted participants through full sessions
    Simulate {
        /// Base URL of a running server; the local store is used when omitted
        #[arg(long)]
        server: Option<String>,

        /// Number of concurrent sessions
        #[arg(short = 'n', long, default_value_t = 1)]
        sessions: usize,

        /// Abandon each session after this many screens
        #[arg(long)]
        leave_after: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cohort=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        config.store.data_dir = data_dir;
    }
    if let Some(port) = cli.http_port {
        config.server.http_port = port;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::Provision { file } => provision(&config, &file),
        Command::Status => status(&config),
        Command::Simulate {
            server,
            sessions,
            leave_after,
        } => simulate(config, server, sessions, leave_after).await,
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<LeaseStore>> {
    let store = LeaseStore::open(&config.store.data_dir, config.store.busy_timeout())
        .with_context(|| format!("opening store in {}", config.store.data_dir.display()))?;
    Ok(Arc::new(store))
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("Data dir: {}", config.store.data_dir.display());
    let store = open_store(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.http_port)
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    serve(listener, AppState::new(store, config)).await?;
    Ok(())
}

fn provision(config: &Config, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let records: Vec<ProvisionRecord> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;

    let store = open_store(config)?;
    let inserted = store.provision(&records)?;
    info!(inserted, skipped = records.len() - inserted, "Provisioning finished");
    Ok(())
}

fn status(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    for record in store.leased()? {
        println!(
            "leased: condition {} holder={} since={}",
            record.condition_id,
            record.holder.as_deref().unwrap_or("-"),
            record.leased_at.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn simulate(
    config: Config,
    server: Option<String>,
    sessions: usize,
    leave_after: Option<usize>,
) -> anyhow::Result<()> {
    let leases: Arc<dyn LeaseService>;
    let content: Arc<dyn ContentSource>;
    let sink: Arc<dyn SessionSink>;
    match server {
        Some(base) => {
            info!(server = %base, "Simulating against remote server");
            let content_url = format!("{}/content/problems.json", base.trim_end_matches('/'));
            leases = Arc::new(HttpLeaseClient::new(base.clone()));
            content = Arc::new(HttpContent::new(content_url));
            sink = Arc::new(HttpSessionSink::new(base));
        }
        None => {
            let local = LocalLeases::new(open_store(&config)?);
            leases = Arc::new(local.clone());
            content = Arc::new(FileContent::new(config.content.problems_path.clone()));
            sink = Arc::new(local);
        }
    }

    let controller = TimelineController::new(leases, content, sink, config.experiment.clone());

    let mut tasks = JoinSet::new();
    for i in 0..sessions {
        let controller = controller.clone();
        let mut script = Script::new();
        if let Some(screens) = leave_after {
            script = script.leave_after(screens);
        }
        tasks.spawn(async move {
            let requester = format!("sim-{}", i);
            let (outcome, _) = run_session(&controller, &requester, script).await;
            (requester, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (requester, outcome) = joined.context("simulation task panicked")?;
        match outcome {
            Ok(SessionOutcome::Completed { payload, delivered }) => info!(
                requester = %requester,
                condition_id = payload.condition_id,
                running_total = payload.running_total,
                delivered,
                "Completed"
            ),
            Ok(SessionOutcome::Abandoned {
                condition_id,
                trials_completed,
            }) => info!(requester = %requester, ?condition_id, trials_completed, "Abandoned"),
            Ok(SessionOutcome::Unavailable) => warn!(requester = %requester, "No condition available"),
            Ok(SessionOutcome::LoadFailed { reason }) => warn!(requester = %requester, reason = %reason, "Load failed"),
            Err(e) => error!(requester = %requester, error = %e, "Timeline failed"),
        }
    }
    Ok(())
}
