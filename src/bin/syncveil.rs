use anyhow::{Context, Result};
use syncveil::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // tonic (OTLP exporter) needs a process wide crypto provider
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))
        .context("TLS crypto provider initialization failed")?;

    let action = cli::start()?;

    action.execute().await?;

    Ok(())
}
