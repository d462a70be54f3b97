//! pixelflow - Main Entry Point
//!
//! Loads a project file, initialises every output node, and drives them with
//! a test pattern until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use pixelflow_rs::{
    backend::serial,
    config::{LoggingConfig, ProjectFile},
    pattern::TestPattern,
    pipeline::{DeliveryOutcome, InitOutcome, NodeHost},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pixelflow", version, author, long_about = None)]
struct Args {
    /// Project file (defaults to the platform config directory)
    project: Option<PathBuf>,

    /// Stop after this many frames (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    frames: u64,

    /// List available serial ports and exit
    #[arg(long, default_value_t = false)]
    list_ports: bool,
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pixelflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

fn list_ports() -> anyhow::Result<()> {
    let ports = serial::available_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

fn load_project(path: Option<PathBuf>) -> anyhow::Result<ProjectFile> {
    let path = match path.or_else(ProjectFile::default_path) {
        Some(path) => path,
        None => return Ok(ProjectFile::default()),
    };
    if !path.exists() {
        eprintln!("Project file {:?} not found, using defaults", path);
        return Ok(ProjectFile::default());
    }
    ProjectFile::load(&path).with_context(|| format!("loading project {:?}", path))
}

async fn run(project: ProjectFile, max_frames: u64) -> anyhow::Result<()> {
    let host = Arc::new(NodeHost::new(project.runtime.output_defaults()));

    for node in &project.nodes {
        match host.on_init(node.id, node.kind, &node.config).await {
            Ok(InitOutcome::Skipped(reason)) => {
                tracing::warn!("{} node {} skipped: {}", node.kind, node.id, reason)
            }
            Ok(outcome) => tracing::info!("{} node {}: {:?}", node.kind, node.id, outcome),
            Err(e) => tracing::error!("{} node {} failed to initialise: {}", node.kind, node.id, e),
        }
    }

    let node_ids = host.node_ids();
    if node_ids.is_empty() {
        tracing::warn!("No output nodes initialised");
    }

    let pattern = TestPattern::from_config(&project.pattern);
    let mut ticker = tokio::time::interval(project.runtime.frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(
        "Driving {} nodes at {} Hz",
        node_ids.len(),
        project.runtime.frame_rate_hz
    );

    let mut tick = 0u64;
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("listening for Ctrl-C")?;
                tracing::info!("Ctrl-C received, shutting down");
                break;
            }
            _ = ticker.tick() => {
                let batch = pattern.batch(tick);
                for &node_id in &node_ids {
                    let host = host.clone();
                    let batch = batch.clone();
                    // fire and forget; a busy sink drops the batch
                    tokio::spawn(async move {
                        match host.on_deliver(node_id, batch).await {
                            Ok(DeliveryOutcome::Sent) => {}
                            Ok(outcome) => match outcome.error(node_id) {
                                Some(e) => tracing::trace!("Node {}: {}", node_id, e),
                                None => tracing::trace!("Node {}: {:?}", node_id, outcome),
                            },
                            Err(e) => tracing::warn!("Node {}: {}", node_id, e),
                        }
                    });
                }
                tick += 1;
                if max_frames > 0 && tick >= max_frames {
                    tracing::info!("Sent {} frames", tick);
                    break;
                }
            }
        }
    }

    for &node_id in &node_ids {
        if let Some(stats) = host.sink_stats(node_id).await {
            tracing::info!("Node {} stats: {:?}", node_id, stats);
        }
    }
    host.shutdown().await;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.list_ports {
        return list_ports();
    }

    let project = load_project(args.project)?;
    let _guard = init_logging(&project.logging)?;

    tracing::info!("Starting pixelflow with project '{}'", project.name);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(run(project, args.frames))
}
