//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::PumpBlueprint;
use dispatcher::SinkRegistry;
use purger::PumpEngine;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_pump(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let mut blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(purge_delay) = args.purge_delay {
        info!(purge_delay, "Overriding purge_delay from CLI");
        blueprint.purge_delay = purge_delay;
    }
    if args.omit_detailed_recording {
        info!("Enabling omit_detailed_recording from CLI");
        blueprint.omit_detailed_recording = true;
    }
    ConfigLoader::validate(&blueprint).context("Invalid configuration after CLI overrides")?;

    info!(
        purge_delay = blueprint.purge_delay,
        store = %blueprint.store.kind,
        record_format = ?blueprint.record_format,
        pumps = blueprint.pumps.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    // Initialize Metrics (optional)
    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let store = storage::create_store(&blueprint.store).map_err(CliError::Store)?;
    let registry = SinkRegistry::with_builtin();
    let engine = PumpEngine::initialize(&blueprint, &registry, store)
        .await
        .map_err(CliError::from)?;
    let engine = Arc::new(engine);

    // Setup graceful shutdown handler
    let shutdown = CancellationToken::new();
    let signal_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, stopping purge loop...");
            shutdown.cancel();
        })
    };

    info!(purge_delay = blueprint.purge_delay, "Starting purge loop");
    Arc::clone(&engine).run_until(shutdown).await;
    signal_task.abort();

    print_run_summary(&engine);

    info!("Analytics Pump finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_run_summary(engine: &PumpEngine) {
    println!("\n{}", engine.summary());

    let sinks = engine.fanout().metrics();
    if !sinks.is_empty() {
        println!("Per-sink totals:");
        for (name, m) in sinks {
            println!(
                "  {}: writes={} records={} failures={} timeouts={} canceled={} advisories={}",
                name,
                m.write_count,
                m.records_delivered,
                m.failure_count,
                m.timeout_count,
                m.canceled_count,
                m.advisory_count
            );
        }
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PumpBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Purge delay: {}s", blueprint.purge_delay);
    println!("Analytics key: {}", blueprint.analytics_key);
    println!("Record format: {:?}", blueprint.record_format);
    println!("Overrun policy: {:?}", blueprint.overrun_policy);
    println!("Omit detailed recording: {}", blueprint.omit_detailed_recording);
    println!("Store: {}", blueprint.store.kind);

    println!("\nPumps ({}):", blueprint.pumps.len());
    for pump in &blueprint.pumps {
        println!(
            "  - {} ({}) timeout={}s filters={} omit_detail={}",
            pump.name,
            pump.resolved_type(),
            pump.timeout,
            pump.filters.rules.len(),
            pump.omit_detailed_recording
        );
    }

    println!();
}
