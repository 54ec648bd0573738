//! `hashlb run`: start the load balancer.
//!
//! Resolves configuration (defaults, optional file, CLI overrides),
//! builds the backend registry, probes every backend once, starts the
//! periodic health probers, and serves until SIGTERM / Ctrl+C. On
//! shutdown the probers are signalled and joined before returning.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::model::Config;
use crate::config::{self, sources, Overrides};
use crate::error::BalancerError;
use crate::logging;
use crate::prober::Prober;
use crate::registry::Registry;
use crate::server::{self, AppState, ProxySettings};

pub async fn execute(args: RunArgs) -> Result<(), BalancerError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let (base, source) = load_base_config(args.config.as_deref()).await?;
    let config = config::resolve(base, &overrides(&args))?;

    let registry = Arc::new(Registry::new(config.backends.iter().cloned()));
    let http_client = server::build_http_client();

    let addr: SocketAddr = format!("{}:{}", args.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let prober = Arc::new(Prober::new(
        Arc::clone(&registry),
        http_client.clone(),
        &config,
    ));
    prober.probe_all().await;

    // Dropping shutdown_tx also stops the probers
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut probers = prober.spawn(&shutdown_rx);

    let state = Arc::new(AppState {
        registry: Arc::clone(&registry),
        http_client,
        settings: ProxySettings::from_config(&config),
    });
    let router = server::build_router(state);

    tracing::info!(
        addr = %addr,
        backends = config.backends.len(),
        healthy = registry.healthy_snapshot().len(),
        scheme = %config.scheme(),
        timeout_secs = config.timeout_sec,
        config = %source,
        version = env!("CARGO_PKG_VERSION"),
        git = env!("HASHLB_GIT_SHORT"),
        "starting load balancer"
    );
    tracing::info!(enabled = config.trace, "tracing support");

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    while let Some(res) = probers.join_next().await {
        if let Err(e) = res {
            tracing::error!(error = %e, "health prober task failed");
        }
    }

    for (backend, status) in registry.statuses() {
        tracing::info!(
            backend = %backend.address(),
            healthy = status.healthy,
            connections = status.connections,
            "final backend state"
        );
    }

    tracing::info!("hashlb stopped");
    Ok(())
}

fn overrides(args: &RunArgs) -> Overrides {
    Overrides {
        port: args.port,
        timeout_sec: args.timeout_sec,
        https: args.https,
        trace: args.trace,
        health_interval_secs: args.health_interval_secs,
        backends: args.backends.clone(),
    }
}

/// Load the explicit config file, else an auto-detected one in the
/// working directory, else the built-in defaults. The second value
/// describes where the config came from, for the startup log.
async fn load_base_config(explicit: Option<&Path>) -> Result<(Config, String), BalancerError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let detected = sources::detect_file(Path::new(".")).await;
            if let Some(ref path) = detected {
                tracing::info!(path = %path.display(), "auto-detected config file");
            }
            detected
        }
    };

    match path {
        Some(path) => {
            let (config, hash) = sources::load_file(&path).await?;
            Ok((config, format!("{} ({hash})", path.display())))
        }
        None => Ok((Config::default(), "built-in defaults".to_string())),
    }
}
