use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crossrelay_core::{RelayApp, RelayConfig};
use crossrelay_storage::Storage;

pub async fn run(config: RelayConfig, db_path: &Path) -> Result<()> {
    let storage = Storage::new(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let app = RelayApp::new(&config, storage)?;

    info!(
        db = %db_path.display(),
        routes = app.engine.resolver().table().route_count(),
        fanout = app.engine.resolver().table().fanout_count(),
        "Relay starting"
    );

    app.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    })
    .await
}
