//! Sidecar bootstrap: config from the environment, provider warm-up, serve.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;

use crypto_sidecar::config::loader;
use crypto_sidecar::http::SidecarServer;
use crypto_sidecar::lifecycle::shutdown;
use crypto_sidecar::observability::logging;
use crypto_sidecar::secret::{FlagdClient, SecretResolver};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = Arc::new(loader::from_env()?);

    tracing::info!(
        mode = %config.mode,
        listen = %config.listener.bind_address,
        upstream = %config.upstream,
        flag_key = %config.secret.flag_key,
        use_flagd = config.secret.use_flagd,
        default_word_set = !config.secret.default_word.trim().is_empty(),
        "crypto sidecar starting"
    );

    if let Some(addr) = config.observability.metrics_address {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(address = %addr, "metrics exporter listening");
    }

    let resolver = if config.secret.use_flagd {
        let client = FlagdClient::new(&config.secret.flagd_host, config.secret.flagd_port)?;
        client.wait_ready(&config.secret.flag_key).await?;
        Arc::new(SecretResolver::with_flagd(
            client,
            config.secret.flag_key.clone(),
            config.secret.default_word.clone(),
        ))
    } else {
        Arc::new(SecretResolver::fixed(config.secret.default_word.clone()))
    };

    let listener = TcpListener::bind(config.listener.bind_address).await?;

    let (shutdown_handle, shutdown_signal) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            shutdown_handle.trigger();
        }
    });

    SidecarServer::new(config, resolver)
        .run(listener, shutdown_signal)
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}
