use std::{error::Error, path::PathBuf, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use promptgate::{
    AppState,
    config::{Config, Environment},
    db::DbPool,
    error::set_expose_validation_detail,
    executor::EchoExecutor,
    system::ensure_system_tenancy,
    usage_buffer::{UsageBufferConfig, UsageLogBuffer},
    usage_sink::DbSink,
};

#[derive(Parser)]
#[command(name = "promptgate", version, about = "Scoped authorization and usage accounting server")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "promptgate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
        Config::default()
    });

    set_expose_validation_detail(config.environment != Environment::Production);

    let db = Arc::new(DbPool::from_config(&config.database).await?);
    db.run_migrations().await?;
    let system_ids = ensure_system_tenancy(&db).await?;
    tracing::info!(
        org_id = system_ids.org_id,
        project_id = system_ids.project_id,
        "system tenant ready"
    );

    let buffer = Arc::new(UsageLogBuffer::new(UsageBufferConfig::from(
        &config.usage_buffer,
    )));
    let worker = buffer.start_worker(Arc::new(DbSink::new(Arc::clone(&db))));

    let state = AppState::new(
        Arc::clone(&config),
        db,
        Arc::clone(&buffer),
        Arc::new(EchoExecutor),
    );
    let app = promptgate::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain buffered usage events before exiting.
    buffer.shutdown();
    worker.await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
