//! Environment variable loading and management.

use std::env;
use std::path::Path;

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to .env file. Only an explicitly given file is loaded.
    pub fn new(env_file: Option<&Path>) -> Self {
        // Only load a .env file if an explicit path was provided. This avoids
        // picking up repository or system .env files during unit tests which
        // expect default values.
        if let Some(path) = env_file {
            if path.exists() {
                if let Err(e) = dotenv::from_path(path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load .env file");
                }
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// The .env file this loader was created with
    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    fn var(name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.is_empty())
    }

    /// `FEDSTORE_DB_ENGINE`
    pub fn db_engine(&self) -> Option<String> {
        Self::var("FEDSTORE_DB_ENGINE")
    }

    /// `FEDSTORE_DB_URL`
    pub fn db_url(&self) -> Option<String> {
        Self::var("FEDSTORE_DB_URL")
    }

    /// `FEDSTORE_DB_NAME`
    pub fn db_name(&self) -> Option<String> {
        Self::var("FEDSTORE_DB_NAME")
    }

    /// `FEDSTORE_DB_COLLECTION`
    pub fn db_collection(&self) -> Option<String> {
        Self::var("FEDSTORE_DB_COLLECTION")
    }

    /// `FEDSTORE_DB_PAGE_LIMIT`, unparsed
    pub fn db_page_limit(&self) -> Option<String> {
        Self::var("FEDSTORE_DB_PAGE_LIMIT")
    }

    /// `FEDSTORE_DB_ENCRYPTION_KEY`
    pub fn db_encryption_key(&self) -> Option<String> {
        Self::var("FEDSTORE_DB_ENCRYPTION_KEY")
    }
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
