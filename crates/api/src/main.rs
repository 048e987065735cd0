//! PolicyQA - security and compliance service for the insurance assistant
//!
//! Loads configuration, builds the application context, runs one
//! maintenance pass, then keeps the maintenance scheduler alive until
//! Ctrl-C.

use anyhow::Context;
use policyqa_lib::utils::logging::init_tracing;
use policyqa_lib::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before tracing so RUST_LOG and POLICYQA_LOG_FORMAT apply
    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "loaded .env"),
        Err(e) => tracing::debug!(error = %e, "no .env file loaded"),
    }

    let config = policyqa_infra::config::load().context("failed to load configuration")?;
    tracing::info!(
        db_path = %config.database.path,
        key_dir = %config.keys.directory.display(),
        "PolicyQA starting"
    );

    let ctx = AppContext::new_with_config(config)
        .await
        .context("failed to initialise application context")?;

    match ctx.run_maintenance().await {
        Ok(report) => {
            tracing::info!(
                rotated = report.rotated,
                purged = report.purged,
                "startup maintenance done"
            );
        }
        Err(e) => tracing::error!(error = %e, "startup maintenance failed"),
    }

    ctx.start_scheduler().await.context("failed to start maintenance scheduler")?;

    let status = ctx.security_status();
    tracing::info!(
        encryption_enabled = status.encryption_enabled,
        active_key_id = status.active_key_id.as_deref().unwrap_or("none"),
        key_rotation_due = status.key_rotation_due,
        "PolicyQA ready"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    tracing::info!("shutdown signal received");

    ctx.shutdown().await.context("failed to shut down cleanly")?;
    Ok(())
}
