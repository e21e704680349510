// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! droverd: the orchestration controller daemon.

use clap::Parser;
use drover_controller::{env, server, ControllerConfig, Orchestrator};
use drover_core::SystemClock;
use drover_planner::PlannerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// How often stale agents are reaped.
const REAP_INTERVAL: Duration = Duration::from_secs(10);
/// How often the retention sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Parser)]
#[command(name = "droverd", about = "Distributed task-orchestration controller")]
struct Args {
    /// Listen port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Log filter (overrides LOG_LEVEL).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = args.log_level.unwrap_or_else(env::log_level);
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ControllerConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }

    let planner_config = PlannerConfig::from_env();
    info!(provider = %planner_config.provider, "planner configured");

    let orchestrator = Orchestrator::new(SystemClock, planner_config.build(), config.clone());

    spawn_reaper(Arc::clone(&orchestrator));
    spawn_sweeper(Arc::clone(&orchestrator));

    let app = server::router(Arc::clone(&orchestrator));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "controller listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_reaper(orchestrator: Arc<Orchestrator<SystemClock>>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REAP_INTERVAL);
        loop {
            ticker.tick().await;
            orchestrator.reap_agents().await;
        }
    });
}

fn spawn_sweeper(orchestrator: Arc<Orchestrator<SystemClock>>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let pruned = orchestrator.sweep_tasks();
            if pruned > 0 {
                info!(pruned, "retention sweep pruned terminal tasks");
            }
        }
    });
}
