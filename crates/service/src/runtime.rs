//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` so the server prepares its directories
//! from the loaded configuration without depending on `common` directly.

use configs::{AppConfig, StorageBackend};

/// Check the static asset directory and create the workbook's directory.
pub async fn ensure_env(cfg: &AppConfig) -> anyhow::Result<()> {
    if let Some(dir) = cfg.server.static_dir.as_deref() {
        common::env::check_static_dir(dir).await;
    }
    if cfg.storage.backend == StorageBackend::Xlsx {
        common::env::ensure_parent_dir(std::path::Path::new(&cfg.storage.xlsx.path)).await?;
    }
    Ok(())
}
