use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use apiflow_core::config::AppConfig;
use apiflow_core::event::{EventBus, FlowEvent};
use apiflow_core::flow::Flow;
use apiflow_core::types::value_to_text;
use apiflow_engine::{topological_order, FlowRunner, NodeExecutor, ReqwestTransport, RunOutcome};

const DEFAULT_FILTER: &str = "apiflow=info,warn";

#[derive(Parser)]
#[command(name = "apiflow", version, about = "Run API request flows in dependency order")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "apiflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every node of a flow, or a single node
    Run {
        /// Flow document (JSON)
        flow: PathBuf,
        /// Run only this node, reading upstream values from saved results
        #[arg(long)]
        node: Option<String>,
        /// Write the run report as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Save the flow with updated results to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Print the execution order of a flow
    Order {
        /// Flow document (JSON)
        flow: PathBuf,
    },
    /// Check that a flow can be executed
    Validate {
        /// Flow document (JSON)
        flow: PathBuf,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "apiflow", &mut std::io::stdout());
        return Ok(());
    }

    let loaded = AppConfig::load_optional(&cli.config)?;
    let config_found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log.filter.as_deref().unwrap_or(DEFAULT_FILTER))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if !config_found {
        warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Order { flow } => {
            let flow = Flow::load(&flow)?;
            for (i, id) in topological_order(&flow.nodes, &flow.edges)?.iter().enumerate() {
                let kind = flow.node(id).map(|n| n.kind.to_string()).unwrap_or_default();
                println!("{:>3}. {} ({})", i + 1, id, kind);
            }
        }
        Commands::Validate { flow: path } => {
            let flow = Flow::load(&path)?;
            let order = topological_order(&flow.nodes, &flow.edges)?;
            let unknown: Vec<_> = flow
                .nodes
                .iter()
                .filter(|n| !n.kind.is_known())
                .map(|n| format!("{} ({})", n.id, n.kind))
                .collect();
            if !unknown.is_empty() {
                warn!(nodes = %unknown.join(", "), "Flow has nodes that cannot execute");
            }
            println!(
                "{}: {} nodes, {} edges, acyclic",
                path.display(),
                order.len(),
                flow.edges.len()
            );
        }
        Commands::Run {
            flow: path,
            node,
            output,
            save,
        } => {
            let mut flow = Flow::load(&path)?;
            let runner = build_runner(&config)?;
            spawn_event_logger(runner.events());

            let succeeded = match node {
                Some(ref node_id) => {
                    let result = runner.run_node(&mut flow, node_id).await?;
                    print_result(node_id, &result.data, result.status, config.http.max_body_chars);
                    write_json(output.as_deref(), &serde_json::to_value(&result)?)?;
                    result.error.is_none()
                }
                None => {
                    let report = runner.run_all(&mut flow).await?;
                    for id in &report.executed {
                        if let Some(result) = flow.node(id).and_then(|n| n.last_result.as_ref()) {
                            print_result(id, &result.data, result.status, config.http.max_body_chars);
                        }
                    }
                    write_json(output.as_deref(), &serde_json::to_value(&report)?)?;
                    match report.outcome {
                        RunOutcome::Succeeded => true,
                        RunOutcome::Failed { ref node_id, ref error } => {
                            eprintln!("Run failed at {}: {}", node_id, error.message);
                            false
                        }
                        RunOutcome::Cancelled { .. } => {
                            eprintln!("Run cancelled");
                            false
                        }
                    }
                }
            };

            if let Some(ref save) = save {
                flow.save(save)?;
                info!(path = %save.display(), "Flow saved");
            }
            if !succeeded {
                anyhow::bail!("flow run did not complete");
            }
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

fn build_runner(config: &AppConfig) -> anyhow::Result<FlowRunner> {
    let transport = ReqwestTransport::new(&config.http)?;
    let executor = NodeExecutor::new(Arc::new(transport)).with_timeout(config.http.timeout());
    let events = Arc::new(EventBus::new(config.run.event_capacity));

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    // Ctrl-C aborts the request in flight
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Cancelling run...");
        cancel_clone.cancel();
    });

    Ok(FlowRunner::new(executor, events).with_cancellation(cancel))
}

fn spawn_event_logger(events: &Arc<EventBus>) {
    tokio::spawn(log_events(events.subscribe()));
}

/// Log run progress until the bus closes. Returns the number of events logged.
async fn log_events(mut rx: Receiver<FlowEvent>) -> usize {
    let mut logged = 0;
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                debug!(skipped = n, "Event logger lagged, skipped events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            FlowEvent::RunStarted { run_id, order } => {
                info!(run_id = %run_id, order = %order.join(" -> "), "Run started");
            }
            FlowEvent::NodeStatus { node_id, status } => {
                if status.is_loading {
                    info!(node_id = %node_id, "Running");
                } else if let Some(error) = status.error {
                    warn!(node_id = %node_id, error = %error.message, "Node failed");
                }
            }
            FlowEvent::RunFinished { run_id, executed } => {
                info!(run_id = %run_id, executed, "Run finished");
            }
            FlowEvent::RunFailed {
                run_id,
                node_id,
                error,
            } => {
                warn!(run_id = %run_id, node_id = ?node_id, error = %error, "Run failed");
            }
        }
        logged += 1;
    }
    logged
}

fn print_result(node_id: &str, data: &Value, status: u16, max_chars: usize) {
    let body = match data {
        Value::String(_) => value_to_text(data),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    };
    let shown: String = body.chars().take(max_chars).collect();
    println!("── {} [{}]", node_id, status);
    println!("{}", shown);
    if body.chars().count() > max_chars {
        println!("... ({} chars truncated)", body.chars().count() - max_chars);
    }
}

fn write_json(path: Option<&Path>, value: &Value) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    info!(path = %path.display(), "Report written");
    Ok(())
}
