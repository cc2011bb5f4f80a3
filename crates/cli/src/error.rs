//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Backing store could not be created
    #[error("Failed to create analytics store: {0}")]
    Store(#[source] contracts::ContractError),

    /// Engine startup error
    #[error("Failed to start pump engine: {0}")]
    Engine(#[from] purger::EngineError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}
