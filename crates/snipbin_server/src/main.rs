//! Headless API server entrypoint.

use snipbin_server::{
    config::env_flag_enabled, resolve_bind_address, serve_router, AppState, CleanupScheduler,
    Config, Database, DEFAULT_PORT,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CliFlags {
    help: bool,
}

fn parse_cli_flags(args: &[String]) -> anyhow::Result<CliFlags> {
    let mut flags = CliFlags::default();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => flags.help = true,
            value if value.starts_with('-') => {
                anyhow::bail!(
                    "Unknown option: '{}'. Use --help to see supported options.",
                    value
                );
            }
            value => {
                anyhow::bail!(
                    "Unexpected positional argument: '{}'. Use --help to see supported options.",
                    value
                );
            }
        }
    }
    Ok(flags)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snipbin=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if parse_cli_flags(&args)?.help {
        print_help();
        return Ok(());
    }

    let config = Config::from_env();
    if config.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set to sign share tokens");
    }

    let database = Arc::new(Database::open(
        &config.db_path,
        snipbin_server::db::StoreOptions {
            max_document_size: config.max_document_size,
            ..Default::default()
        },
    )?);
    let state = AppState::with_shared_db(config.clone(), database.clone())?;

    let shutdown = CancellationToken::new();
    let cleanup = CleanupScheduler::spawn(
        database,
        config.cleanup_interval,
        config.expire_after,
        shutdown.clone(),
    );

    let allow_public = env_flag_enabled("ALLOW_PUBLIC_ACCESS");
    if allow_public {
        tracing::warn!("Public access enabled - server will accept requests from any origin");
    }

    let bind_addr = resolve_bind_address(&config, allow_public);
    if !bind_addr.ip().is_loopback() {
        tracing::warn!(
            "Binding to non-localhost address: {} - ensure proper security measures are in place",
            bind_addr
        );
    }

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!("snipbin running at http://{}", actual_addr);

    let signal_token = shutdown.clone();
    let serve_result = serve_router(listener, state, allow_public, async move {
        shutdown_signal().await;
        signal_token.cancel();
    })
    .await;

    shutdown.cancel();
    if let Some(handle) = cleanup {
        if let Err(err) = handle.await {
            tracing::error!("Cleanup scheduler ended abnormally: {}", err);
        }
    }

    serve_result?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_help() {
    println!("snipbin server\n");
    println!("Usage: snipbin [OPTIONS]\n");
    println!("Options:");
    println!("  --help            Show this help message");
    println!("\nEnvironment variables:");
    println!("  DB_PATH           Database file (default: ~/.cache/snipbin/snipbin.redb)");
    println!("  PORT              Server port (default: {})", DEFAULT_PORT);
    println!("  BIND              Override bind address (e.g. 0.0.0.0:{})", DEFAULT_PORT);
    println!("  ALLOW_PUBLIC_ACCESS  Allow non-loopback binds and CORS from any origin");
    println!("  JWT_SECRET        Secret used to sign share tokens (required)");
    println!("  MAX_DOCUMENT_SIZE Maximum document length in characters (0 = unlimited)");
    println!("  EXPIRE_AFTER      Delete versions older than this many seconds (0 = never)");
    println!("  CLEANUP_INTERVAL  Seconds between expiry sweeps (default: 60)");
    println!("  WEBHOOK_TIMEOUT   Seconds allowed per webhook delivery (default: 10)");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
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
    tracing::info!("Shutdown signal received");
}
