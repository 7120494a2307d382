use crate::config::ForumConfig;
use crate::database::Database;
use anyhow::{Context, Result};
use std::fs;

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    pub database_initialized: bool,
    pub database: Database,
}

/// Creates the data directory, opens the database and applies migrations.
pub fn initialize(config: &ForumConfig) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    create_dir_if_missing(&config.paths.data_dir, &mut directories_created)?;

    let database = Database::connect(&config.paths)
        .with_context(|| format!("failed to open {}", config.paths.db_path.display()))?;
    let database_initialized = database.ensure_migrations()?;

    Ok(BootstrapResources {
        directories_created,
        database_initialized,
        database,
    })
}

fn create_dir_if_missing(path: &std::path::Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        created.push(path.display().to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForumPaths;

    #[test]
    fn initialize_creates_layout_once() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForumPaths::from_base_dir(dir.path()).unwrap();
        let config = ForumConfig::new(0, paths.clone());

        let first = initialize(&config).unwrap();
        assert!(first.database_initialized);
        assert_eq!(
            first.directories_created,
            vec![paths.data_dir.display().to_string()]
        );
        assert!(paths.db_path.exists());
        assert!(!dir.path().join("logs").exists());
        drop(first);

        let second = initialize(&config).unwrap();
        assert!(!second.database_initialized);
        assert!(second.directories_created.is_empty());
    }
}
