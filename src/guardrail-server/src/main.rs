//! Guardrail hook/event ingestor binary.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use guardrail_server::{GuardrailConfig, run_with_shutdown};

/// Guardrail hook/event ingestor.
#[derive(Parser)]
#[command(name = "guardrail-server")]
#[command(about = "Local security monitor and inline policy enforcer for coding-agent tool calls")]
#[command(version)]
struct Args {
    /// JSON configuration file path; overrides environment variables.
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address.
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging.
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(&args.log_level, args.json_logs);

    let mut config = if let Some(config_path) = args.config {
        match GuardrailConfig::load(&config_path) {
            Ok(c) => c,
            Err(e) => {
                error!("failed to load config from {}: {}", config_path, e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        match GuardrailConfig::from_env() {
            Ok(c) => c,
            Err(e) => {
                error!("failed to load config from environment: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    info!("starting guardrail on {}", config.listen_addr);
    info!("blocking_enabled={} fail_closed={}", config.blocking_enabled, config.fail_closed);
    info!("press ctrl-c to stop");

    let shutdown_timeout = config.shutdown_timeout_secs;
    let shutdown = async move {
        let ctrl_c = async {
            signal::ctrl_c().await.expect("failed to install ctrl-c handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received ctrl-c, shutting down (up to {}s for in-flight classifications)...", shutdown_timeout),
            _ = terminate => info!("received SIGTERM, shutting down (up to {}s for in-flight classifications)...", shutdown_timeout),
        }
    };

    if let Err(e) = run_with_shutdown(config, shutdown).await {
        error!("server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("guardrail stopped");
    ExitCode::SUCCESS
}
