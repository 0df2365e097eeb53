//! Startup sequencing
//!
//! Ordered bring-up: parse arguments, initialize logging, load and validate
//! configuration (any failure here exits non-zero before the loop starts),
//! then wire the collaborators together and run the scan loop until an
//! ordered shutdown completes.

use crate::checkpoint::CheckpointStore;
use crate::core::config::{Cli, Config};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::{init_logging, reconfigure_logging};
use crate::core::shutdown::ShutdownCoordinator;
use crate::notifications::SummaryNotifier;
use crate::output::ReportWriter;
use crate::scanner::ScanManager;
use crate::search::{GithubSearchClient, HttpKeyValidator};
use crate::server::run_health_server;
use crate::sync::{
    GroupedAppendSink, HttpGroupTransport, HttpMergeTransport, MergeListSink, SyncDispatcher,
};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Bounded wait for the dispatcher's final drain during shutdown
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Initialize and run the application
pub fn startup() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_level.as_deref(), cli.log_file.as_deref()) {
        eprintln!("FATAL: cannot initialize logging: {e}");
        std::process::exit(1);
    }

    log::info!("keysweep starting");

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            log_error_with_context(&e, "Configuration loading");
            std::process::exit(1);
        }
    };
    if cli.log_level.is_none() {
        if let Some(level) = &config.log_level {
            if let Err(e) = reconfigure_logging(level) {
                log::warn!("Cannot apply config log level '{}': {}", level, e);
            }
        }
    }
    if let Err(e) = config.validate() {
        log_error_with_context(&e, "Configuration validation");
        std::process::exit(1);
    }
    let queries = match config.load_queries() {
        Ok(queries) => queries,
        Err(e) => {
            log_error_with_context(&e, "Query list loading");
            std::process::exit(1);
        }
    };
    log::info!("Loaded {} search queries", queries.len());

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("FATAL: cannot start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config, queries)) {
        log::error!("FATAL: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config, queries: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config);

    let shutdown = ShutdownCoordinator::new();
    shutdown.install_signal_handlers();

    let reports = Arc::new(ReportWriter::new(&config.data_dir));
    reports.check()?;

    let store = CheckpointStore::new(config.checkpoint_path());
    let checkpoint = store.load()?;
    match checkpoint.last_scan_time {
        Some(last_scan) => log::info!(
            "Resuming from checkpoint: last scan {}, {} sha(s) known",
            last_scan,
            checkpoint.scanned_shas.len()
        ),
        None => log::info!("No previous checkpoint, starting fresh"),
    }
    let checkpoint = Arc::new(Mutex::new(checkpoint));

    // Health probes run fully independently of the scan state
    let health_port = config.health_port;
    let health_rx = shutdown.subscribe();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(health_port, health_rx).await {
            log::error!("Health check server failed: {}", e);
        }
    });

    let merge = match &config.merge_sink {
        Some(sink_config) if config.merge_sink_enabled() => {
            log::info!("Merge sink enabled - URL: {}", sink_config.url);
            let transport =
                HttpMergeTransport::new(&sink_config.url, sink_config.auth_token.clone())?;
            Some(MergeListSink::new(
                Box::new(transport),
                sink_config.echoes_keys,
            ))
        }
        _ => None,
    };
    let grouped = match &config.grouped_sink {
        Some(sink_config) if config.grouped_sink_enabled() => {
            log::info!(
                "Grouped sink enabled - URL: {}, groups: {}",
                sink_config.url,
                sink_config.group_names.join(", ")
            );
            let transport =
                HttpGroupTransport::new(&sink_config.url, sink_config.auth_token.clone())?;
            Some(GroupedAppendSink::new(
                Box::new(transport),
                sink_config.group_names.clone(),
            ))
        }
        _ => None,
    };

    let dispatcher = Arc::new(SyncDispatcher::new(
        checkpoint.clone(),
        store.clone(),
        reports.clone(),
        merge,
        grouped,
    ));
    let flush_handle = dispatcher.clone().spawn_periodic(
        Duration::from_secs(config.flush_interval_secs),
        shutdown.subscribe(),
    );

    let notifier = match &config.notifier {
        Some(notifier_config) if config.notifier_enabled() => Some(Arc::new(SummaryNotifier::new(
            &notifier_config.bot_token,
            notifier_config.chat_id.clone(),
        )?)),
        _ => None,
    };

    let search = Arc::new(GithubSearchClient::new(config.github_tokens.clone())?);
    let validator = Arc::new(HttpKeyValidator::new(
        config.validation_endpoint.clone(),
        config.check_model.clone(),
        !config.no_jitter,
    )?);

    let manager = ScanManager::new(
        config.clone(),
        queries,
        search,
        validator,
        checkpoint,
        store,
        dispatcher,
        reports,
        notifier,
    )?;

    manager.run(&shutdown).await;

    // Ordered shutdown: make sure the dispatcher sees the signal, then give
    // its final drain a bounded window
    shutdown.trigger_shutdown();
    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, flush_handle)
        .await
        .is_err()
    {
        log::warn!("Sync dispatcher drain timed out, exiting anyway");
    }

    log::info!("Shutdown complete");
    Ok(())
}
