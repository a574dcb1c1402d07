//! sav-scan - value a single photo from the command line
//!
//! Reads an image file, encodes it as a data URL and runs it through the
//! valuation client, either directly against the upstream inference API or
//! through a relay (`--relay-url`).

use anyhow::{Context, Result};
use base64::Engine;
use clap::Parser;
use sav_common::config::{resolve_api_key, resolve_config_path, TomlConfig};
use sav_valuation::{
    InferenceTransport, RelayTransport, RequestBuilder, RetryPolicy, UpstreamTransport,
    ValuationClient, ValuationResult,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "sav-scan", version, about = "Estimate the value of the item in a photo")]
struct Args {
    /// Image file to value (JPEG, PNG, WebP, ...)
    image: PathBuf,

    /// Config file (defaults to SAV_CONFIG or the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Send the image through a relay instead of calling upstream directly
    #[arg(long, env = "SAV_RELAY_URL")]
    relay_url: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = TomlConfig::load(&config_path)?;

    sav_common::logging::init_tracing(&config.logging.level);
    info!(
        "Starting sav-scan v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let timeout = Duration::from_secs(config.upstream.timeout_secs);
    let transport: Arc<dyn InferenceTransport> = match &args.relay_url {
        Some(url) => {
            info!("Using relay at {}", url);
            Arc::new(RelayTransport::new(url.clone(), timeout)?)
        }
        None => {
            let api_key = resolve_api_key(&config)?;
            info!("Using upstream endpoint {}", config.upstream.endpoint);
            Arc::new(UpstreamTransport::new(
                config.upstream.endpoint.clone(),
                api_key,
                timeout,
            )?)
        }
    };

    let client = ValuationClient::new(
        transport,
        RequestBuilder::new(config.upstream.model.clone()),
        RetryPolicy::from(&config.retry),
    );

    let data_url = encode_image_file(&args.image)?;

    let result = match client.value_image(&data_url).await {
        Ok(result) => result,
        Err(err) => {
            if err.allows_manual_retry() {
                eprintln!("Valuation failed: {}. Try capturing the photo again.", err);
            } else {
                eprintln!("Valuation failed: {}", err);
            }
            std::process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_summary(&result));
    }

    Ok(())
}

/// Read an image file into a base64 data URL, sniffing the MIME type
fn encode_image_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(to_data_url(&bytes))
}

fn to_data_url(bytes: &[u8]) -> String {
    let mime = infer::get(bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream");
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, encoded)
}

fn render_summary(result: &ValuationResult) -> String {
    let mut out = format!(
        "{:<32} ${:>10.2}\n",
        result.item_name, result.estimated_value
    );
    for object in &result.detected_objects {
        out.push_str(&format!(
            "  {:<30} ${:>10.2}  ({:.0}% confidence)\n",
            object.name,
            object.estimated_value,
            object.confidence * 100.0
        ));
    }
    out.push_str(&format!("{:<32} ${:>10.2}\n", "Total", result.total_value()));
    out
}
