//! sav-relay - valuation relay service
//!
//! Forwards `{ imageDataUrl }` requests to the upstream inference API using a
//! credential held only on the server, and answers browser pre-flight
//! requests.

use anyhow::Result;
use clap::Parser;
use sav_common::config::{resolve_api_key, resolve_config_path, TomlConfig};
use sav_relay::{build_router, AppState};
use sav_valuation::{RequestBuilder, RetryPolicy, UpstreamTransport, ValuationClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "sav-relay", version, about = "Valuation relay service")]
struct Args {
    /// Config file (defaults to SAV_CONFIG or the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen port (overrides [relay] port)
    #[arg(long, env = "SAV_RELAY_PORT")]
    port: Option<u16>,

    /// Listen address (overrides [relay] bind)
    #[arg(long, env = "SAV_RELAY_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = TomlConfig::load(&config_path)?;

    sav_common::logging::init_tracing(&config.logging.level);

    // Log build identification immediately after tracing init
    info!(
        "Starting SAV relay (sav-relay) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // A missing credential is not fatal: the relay still starts, answers
    // pre-flight and health requests, and fails valuations with a clear error
    let client = match resolve_api_key(&config) {
        Ok(api_key) => {
            let transport = UpstreamTransport::new(
                config.upstream.endpoint.clone(),
                api_key,
                Duration::from_secs(config.upstream.timeout_secs),
            )?;
            let policy = RetryPolicy {
                max_attempts: config.relay.max_attempts.max(1),
                ..RetryPolicy::from(&config.retry)
            };
            info!(
                endpoint = %config.upstream.endpoint,
                model = %config.upstream.model,
                max_attempts = policy.max_attempts,
                "Upstream client configured"
            );
            Some(ValuationClient::new(
                Arc::new(transport),
                RequestBuilder::new(config.upstream.model.clone()),
                policy,
            ))
        }
        Err(e) => {
            warn!("{}", e);
            warn!("Valuation requests will fail until an upstream API key is configured");
            None
        }
    };

    let state = AppState::new(client).with_max_body_bytes(config.relay.max_body_bytes);
    info!(max_body_bytes = state.max_body_bytes, "Request body limit");
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.relay.bind);
    let port = args.port.unwrap_or(config.relay.port);
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("sav-relay listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
