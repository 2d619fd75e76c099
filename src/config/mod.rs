//! Configuration management for the storage layer.
//!
//! This module provides configuration loading through TOML files and
//! environment variable management via `.env` files.
//!
//! # Example
//!
//! ```no_run
//! use fedstore::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! // Load environment variables
//! let env = EnvironmentLoader::new(Some(Path::new(".env")));
//!
//! // Load configuration from TOML, then let FEDSTORE_DB_* override it
//! let mut loader = ConfigurationLoader::new(Some(Path::new("config/fedstore.toml"))).unwrap();
//! loader.apply_env_overrides(&env).unwrap();
//!
//! println!("Engine: {}", loader.database().engine);
//! ```

#[allow(clippy::module_inception)]
pub mod config;
pub mod environment;

// Re-export main types for convenience
pub use self::config::{Configuration, ConfigurationLoader, DatabaseConfig};
pub use self::environment::EnvironmentLoader;
