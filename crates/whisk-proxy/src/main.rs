//! Whisk action proxy - main entry point
//!
//! Listens for the init/run control protocol and runs the action loaded at
//! init from a dynamic library in the package.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whisk_proxy::runtime::DylibLoader;
use whisk_proxy::{create_router, ActionRuntime, ProxyConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout belongs to the action's output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,whisk_proxy=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting whisk action proxy");

    let config = ProxyConfig::from_env();
    tracing::info!("Configuration loaded: {:?}", config);

    let runtime = Arc::new(ActionRuntime::new(&config, Arc::new(DylibLoader::new())));
    let app = create_router(runtime, &config);

    let addr = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Action proxy listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
