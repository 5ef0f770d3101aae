//! Cache management CLI commands.

use std::path::PathBuf;

use clap::Subcommand;

use crate::commands::common::{cache_config, format_size, open_cache};
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show disk cache statistics
    Stats,
    /// Clear the disk cache, removing all cached images
    Clear,
}

/// Run a cache subcommand.
pub async fn run(
    action: CacheAction,
    cache_dir: Option<PathBuf>,
    cache_max_mb: Option<u64>,
) -> Result<(), CliError> {
    let config = cache_config(cache_dir, cache_max_mb);
    let store = open_cache(&config).await?;

    match action {
        CacheAction::Stats => {
            println!("Disk cache: {}", store.cache_dir().display());
            println!("  Entries: {}", store.entry_count());
            println!(
                "  Size:    {} / {}",
                format_size(store.size_bytes()),
                format_size(store.max_size_bytes())
            );
            Ok(())
        }
        CacheAction::Clear => {
            let entries = store.entry_count();
            let bytes = store.size_bytes();
            store
                .clear()
                .await
                .map_err(|e| CliError::Cache(e.to_string()))?;
            println!("Deleted {} entries, freed {}", entries, format_size(bytes));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clear_on_empty_cache() {
        let dir = TempDir::new().unwrap();
        let result = run(
            CacheAction::Clear,
            Some(dir.path().to_path_buf()),
            Some(16),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_stats_on_empty_cache() {
        let dir = TempDir::new().unwrap();
        let result = run(
            CacheAction::Stats,
            Some(dir.path().to_path_buf()),
            None,
        )
        .await;
        assert!(result.is_ok());
    }
}
