// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker entry point.

use clap::Parser;
use gitfix_adapters::{
    DockerSandbox, ForgeClient, GithubForge, GithubForgeConfig, SandboxAgent,
};
use gitfix_core::{Provider, SystemClock};
use gitfix_queue::Queue;
use gitfix_store::MemoryStore;
use gitfix_worker::processor::{AgentRegistry, WorkerContext};
use gitfix_worker::runtime::{BootOptions, WorkerRuntime};
use gitfix_worker::{MetricsRecorder, TaskStateManager, WorkerConfig};
use gitfix_workspace::WorkspaceManager;
use std::sync::Arc;

/// Autonomous issue-resolution worker.
#[derive(Debug, Parser)]
#[command(name = "gitfix-worker", version, about)]
struct Cli {
    /// Drain the queue and purge worker/state keys before starting.
    #[arg(long)]
    reset: bool,

    /// Override handler concurrency.
    #[arg(long, short = 'c')]
    concurrency: Option<usize>,

    /// Disable heartbeat publishing (for testing).
    #[arg(long)]
    no_heartbeat: bool,
}

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily("logs", "gitfix-worker.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    guard
}

fn build_context(config: WorkerConfig) -> Result<Arc<WorkerContext<SystemClock>>, String> {
    let clock = SystemClock;
    let store = Arc::new(MemoryStore::new(clock.clone()));
    tracing::info!(
        redis = %format!("{}:{}", config.redis_host, config.redis_port),
        "datastore endpoint recorded; using the in-process store"
    );

    let forge: Arc<dyn ForgeClient> = {
        let (Some(app_id), Some(key_path), Some(installation_id)) = (
            config.gh_app_id,
            config.gh_private_key_path.clone(),
            config.gh_installation_id,
        ) else {
            return Err(
                "GH_APP_ID, GH_PRIVATE_KEY_PATH and GH_INSTALLATION_ID are required".to_string()
            );
        };
        let pem = std::fs::read_to_string(&key_path)
            .map_err(|e| format!("cannot read {}: {e}", key_path.display()))?;
        let forge_config = GithubForgeConfig {
            app_id,
            private_key_pem: pem,
            installation_id,
        };
        Arc::new(GithubForge::new(&forge_config).map_err(|e| e.to_string())?)
    };

    let sandbox = Arc::new(DockerSandbox::new("gitfix/agent:latest"));
    let agents = AgentRegistry::new()
        .register(Provider::Claude, Arc::new(SandboxAgent::new(sandbox.clone(), Provider::Claude)))
        .register(Provider::OpenAi, Arc::new(SandboxAgent::new(sandbox.clone(), Provider::OpenAi)))
        .register(Provider::Gemini, Arc::new(SandboxAgent::new(sandbox, Provider::Gemini)));

    let queue = Queue::new(store.clone(), config.queue_name.clone(), clock.clone());
    let workspaces = Arc::new(WorkspaceManager::new(
        config.clones_base.clone(),
        config.worktrees_base.clone(),
        config.default_branch.clone(),
        clock.clone(),
    ));
    let tasks = TaskStateManager::new(store.clone(), clock.clone());
    let metrics = Arc::new(MetricsRecorder::new(
        store.clone(),
        clock.clone(),
        config.cost_threshold_usd,
    ));

    Ok(Arc::new(WorkerContext {
        store,
        queue,
        forge,
        agents,
        workspaces,
        tasks,
        metrics,
        config,
        clock,
    }))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _guard = init_tracing();

    let config = WorkerConfig::from_env();
    let ctx = match build_context(config) {
        Ok(ctx) => ctx,
        Err(message) => {
            tracing::error!(%message, "startup failed");
            eprintln!("startup failed: {message}");
            std::process::exit(1);
        }
    };

    let runtime = WorkerRuntime::new(ctx);
    let opts = BootOptions {
        reset: cli.reset,
        concurrency: cli.concurrency,
        no_heartbeat: cli.no_heartbeat,
    };
    let running = runtime.start(&opts).await;

    let interrupted = wait_for_signal().await;
    running.shutdown().await;

    if interrupted {
        std::process::exit(130);
    }
}

/// Wait for SIGINT or SIGTERM. Returns true for SIGINT.
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "cannot install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return true;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received");
            true
        }
        _ = sigterm.recv() => {
            tracing::info!("SIGTERM received");
            false
        }
    }
}
