// `fanout serve-stub`: run the lookup stub on the configured endpoint until Ctrl-C

use crate::settings::{expand_path, Settings};
use anyhow::{Context, Result};
use fanout_infra_net::stub_server::{serve, Catalog};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub async fn execute(settings: &Settings, catalog_path: Option<&Path>) -> Result<()> {
    let catalog = match catalog_path {
        Some(path) => {
            let path = expand_path(&path.to_string_lossy());
            Catalog::from_file(&path)
                .with_context(|| format!("Failed to read catalog {}", path.display()))?
        }
        None => Catalog::default(),
    };
    if catalog.is_empty() {
        warn!("Catalog is empty, every lookup will be 'not found'");
    }

    let endpoint = &settings.driver.endpoint;
    let listener = TcpListener::bind((endpoint.host.as_str(), endpoint.port))
        .await
        .with_context(|| format!("Failed to bind {}", endpoint))?;

    let accepted = Arc::new(AtomicUsize::new(0));
    serve(listener, Arc::new(catalog), Arc::clone(&accepted), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    info!(connections = accepted.load(Ordering::Relaxed), "Stub server exited");
    Ok(())
}
