use anyhow::Context;

use herbstore_api::app::errors::expose_internal_errors;
use herbstore_api::{build_app, AppServices};
use herbstore_infra::{spawn_sweeper, AppConfig, SWEEP_INTERVAL};
use herbstore_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let development = config.env.is_development();

    herbstore_observability::init_with(if development { LogFormat::Pretty } else { LogFormat::Json });
    expose_internal_errors(development);

    let services = AppServices::from_config(&config).await?;
    if let Some(bootstrap) = &config.bootstrap_admin {
        services.bootstrap_admin(bootstrap).await?;
    }

    let sweeper = spawn_sweeper(services.store.clone(), services.otp.clone(), SWEEP_INTERVAL);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, development, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.shutdown().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
