//! graced — the grace lifecycle daemon.
//!
//! Runs next to a service instance and owns its traffic lifecycle:
//! - Readiness probe (`/grace/health`)
//! - Lifecycle hooks fed by the registry integration
//! - Warm-up weighted instance selection
//! - Bounded drain of in-flight requests on SIGTERM / Ctrl-C
//!
//! # Usage
//!
//! ```text
//! graced run --config /etc/grace/grace.toml --host 10.0.0.1 --service orders
//! graced run --set grace.rule.warmUpTime=30 --log-json
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use grace_core::{GraceConfig, rule_key};
use graced::api::build_router;
use graced::context::GraceContext;

#[derive(Parser)]
#[command(name = "graced", about = "Grace lifecycle daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the grace endpoints until terminated, then drain.
    Run {
        /// Path to grace.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Listen port. Overrides `http_server_port`.
        #[arg(long)]
        port: Option<u16>,

        /// Address the service instance is reachable at.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port the service instance serves traffic on.
        #[arg(long, default_value = "8080")]
        service_port: u16,

        /// Service name announced to peers on shutdown.
        #[arg(long, default_value = "default")]
        service: String,

        /// Config override, `key=value`. The `grace.rule.` prefix is optional.
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((rule_key(key), value.trim().to_string()))
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,grace=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            host,
            service_port,
            service,
            set,
            log_json,
        } => {
            init_tracing(log_json);
            let mut grace = match config {
                Some(path) => GraceConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => GraceConfig::default(),
            };
            let overrides: HashMap<String, String> = set.into_iter().collect();
            let changed = grace.apply_overrides(&overrides);
            if changed < overrides.len() {
                warn!(given = overrides.len(), changed, "some config overrides had no effect");
            }
            if let Some(port) = port {
                grace.http_server_port = port;
            }
            run(grace, &host, service_port, &service).await
        }
    }
}

async fn run(config: GraceConfig, host: &str, service_port: u16, service: &str) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_server_port));
    info!(
        %service,
        warm_up = config.enable_warm_up,
        graceful_shutdown = config.enable_grace_shutdown,
        offline_notify = config.enable_offline_notify,
        "grace daemon starting"
    );

    let ctx = GraceContext::new(config, service, host, service_port);
    let router = build_router(ctx.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "grace endpoints listening");

    // Keep serving while draining so in-flight requests finish and
    // callers see the shutdown markers.
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let report = ctx.drain_coordinator().run().await;
            info!(
                outcome = ?report.outcome,
                remaining = report.remaining,
                waited_ms = report.waited.as_millis() as u64,
                "drain finished"
            );
        })
        .await?;

    info!("grace daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
