//! `maestro`: ask questions, serve the orchestrator, host workers.

mod config;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use config::{AgentEntry, ClassifierKind, MaestroConfig};
use maestro_a2a::{
    AgentCard, AgentSkill, CapabilityRegistry, CardResolver, HttpWorkerClient, WorkerClient,
    WorkerDescriptor,
};
use maestro_agent::{LlmClient, TextCompletion};
use maestro_gateway::{decorate, A2aServer, AgentHandler, InstructedAgent, OrchestratorHandler};
use maestro_orchestrator::{
    KeywordClassifier, ModelClassifier, Orchestrator, Planner, QueryClassifier, WorkerCompletion,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maestro", about = "Maestro: multi-agent orchestration over A2A")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "maestro.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one query through the orchestrator and print the answer.
    Ask {
        query: String,
        /// Print every task event as a JSON line on stderr.
        #[arg(long)]
        events: bool,
    },
    /// Expose the orchestrator as an A2A agent.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Host one of the configured instruction-driven workers.
    Worker {
        name: String,
        #[arg(long)]
        port: Option<u16>,
    },
    /// List the configured workers and what their cards advertise.
    Workers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Ask { query, events } => ask(&config, &query, events).await,
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Worker { name, port } => worker(&config, &name, port).await,
        Commands::Workers => list_workers(&config).await,
    }
}

async fn load_config(path: &Path) -> anyhow::Result<MaestroConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(toml::from_str("")?);
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config in {}", path.display()))
}

async fn ask(config: &MaestroConfig, query: &str, events: bool) -> anyhow::Result<()> {
    let mut orchestrator = build_orchestrator(config).await?;

    let printer = events.then(|| {
        let mut rx = orchestrator.subscribe();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => eprintln!("{line}"),
                    Err(e) => warn!(error = %e, "Unprintable task event"),
                }
            }
        })
    });

    let result = orchestrator.run(query).await;
    drop(orchestrator);
    if let Some(printer) = printer {
        printer.await?;
    }

    let report = result?;
    println!("{}", report.text);
    Ok(())
}

async fn serve(config: MaestroConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let orchestrator = build_orchestrator(&config).await?;

    let card = AgentCard::new(
        "maestro",
        "Routes requests to specialised agents and combines their answers.",
        config.server.public_url(port),
    )
    .with_skill(AgentSkill {
        id: "orchestrate".into(),
        name: "Orchestrate".into(),
        description: "Plan a request across the registered workers and aggregate the replies."
            .into(),
        tags: vec!["orchestration".into()],
        examples: vec!["Analyze the sentiment of 'I love this'".into()],
    });

    let handler: Arc<dyn AgentHandler> = Arc::new(OrchestratorHandler::new(Arc::new(orchestrator)));
    bind_and_serve(A2aServer::new(card, handler), &host, port).await
}

async fn worker(config: &MaestroConfig, name: &str, port: Option<u16>) -> anyhow::Result<()> {
    let entry = config
        .agents
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| anyhow!("no agent named '{name}' in the [[agents]] table"))?;
    let port = port.unwrap_or(entry.port);

    let completion: Arc<dyn TextCompletion> = Arc::new(LlmClient::new(config.model.resolve()?)?);
    let agent: Arc<dyn AgentHandler> = Arc::new(InstructedAgent::new(
        entry.name.clone(),
        entry.instruction.clone(),
        completion,
    ));
    let handler: Arc<dyn AgentHandler> = if entry.post_process.is_empty() {
        agent
    } else {
        let steps = entry.post_process.iter().map(|s| s.processor()).collect();
        Arc::new(decorate(agent, steps))
    };

    let card = worker_card(entry, config.server.public_url(port));
    bind_and_serve(A2aServer::new(card, handler), &config.server.host, port).await
}

fn worker_card(entry: &AgentEntry, url: String) -> AgentCard {
    let description = if entry.description.is_empty() {
        format!("The {} agent", entry.name)
    } else {
        entry.description.clone()
    };
    AgentCard::new(entry.name.clone(), description.clone(), url).with_skill(AgentSkill {
        id: entry.name.clone(),
        name: entry.name.clone(),
        description,
        tags: entry.tags.clone(),
        examples: entry.examples.clone(),
    })
}

async fn bind_and_serve(server: A2aServer, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Listening");
    server.serve(listener).await?;
    Ok(())
}

async fn list_workers(config: &MaestroConfig) -> anyhow::Result<()> {
    let registry = build_registry(config).await?;
    if registry.is_empty() {
        println!("No workers registered.");
        return Ok(());
    }
    for worker in registry.descriptors() {
        print!("{}", describe_worker(&worker));
    }
    Ok(())
}

fn describe_worker(worker: &WorkerDescriptor) -> String {
    let mode = if worker.streaming { "streaming" } else { "blocking" };
    let mut out = format!("{} ({}, {mode})\n", worker.name, worker.address);
    if !worker.description.is_empty() {
        out.push_str(&format!("  {}\n", worker.description));
    }
    for skill in &worker.skills {
        out.push_str(&format!("  - {}: {}", skill.name, skill.description));
        if !skill.tags.is_empty() {
            out.push_str(&format!(" [{}]", skill.tags.join(", ")));
        }
        out.push('\n');
    }
    out
}

/// Registers every configured worker. Discoverable workers whose card
/// cannot be fetched are still registered from their configured address,
/// so a late-starting worker fails at dispatch rather than at startup.
async fn build_registry(config: &MaestroConfig) -> anyhow::Result<CapabilityRegistry> {
    let registry = CapabilityRegistry::new();
    let resolver = CardResolver::new(config.client.timeout())?;

    let sources: Vec<_> = config
        .workers
        .iter()
        .filter(|w| w.discover)
        .map(|w| w.source())
        .collect();
    let failed = resolver.discover_into(&registry, &sources).await;

    for entry in &config.workers {
        let discovered = entry.discover && !failed.iter().any(|(name, _)| name == &entry.name);
        if discovered {
            continue;
        }
        registry.register(
            WorkerDescriptor::new(entry.name.clone(), entry.url.clone())
                .with_streaming(entry.streaming),
        )?;
    }
    Ok(registry)
}

async fn build_orchestrator(config: &MaestroConfig) -> anyhow::Result<Orchestrator> {
    let registry = Arc::new(build_registry(config).await?);
    let client: Arc<dyn WorkerClient> = Arc::new(HttpWorkerClient::new(config.client.timeout())?);
    let section = &config.orchestrator;

    let needs_model =
        section.planner_worker.is_none() || section.classifier == ClassifierKind::Model;
    let model: Option<Arc<dyn TextCompletion>> = if needs_model {
        Some(Arc::new(LlmClient::new(config.model.resolve()?)?))
    } else {
        None
    };

    let planner_completion: Arc<dyn TextCompletion> = match (&section.planner_worker, &model) {
        (Some(name), _) => {
            info!(worker = %name, "Planning through remote worker");
            Arc::new(WorkerCompletion::new(client.clone(), registry.resolve(name)?))
        }
        (None, Some(model)) => model.clone(),
        (None, None) => return Err(anyhow!("no completion model available for planning")),
    };

    let classifier: Arc<dyn QueryClassifier> = match (section.classifier, &model) {
        (ClassifierKind::Model, Some(model)) => Arc::new(ModelClassifier::new(model.clone())),
        _ => Arc::new(KeywordClassifier::default()),
    };

    Ok(Orchestrator::new(
        registry,
        client,
        Planner::new(planner_completion),
        classifier,
    )
    .with_config(section.engine.clone()))
}
