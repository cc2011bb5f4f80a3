//! Dispatcher error types

use contracts::ContractError;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// No constructor registered for the sink type
    #[error("unknown sink type '{sink_type}' for sink '{name}'")]
    UnknownSinkType { name: String, sink_type: String },

    /// Sink rejected its settings during init
    #[error("failed to init sink '{name}': {source}")]
    SinkInit {
        name: String,
        #[source]
        source: ContractError,
    },
}

impl DispatcherError {
    /// Create an unknown sink type error
    pub fn unknown_sink_type(name: impl Into<String>, sink_type: impl Into<String>) -> Self {
        Self::UnknownSinkType {
            name: name.into(),
            sink_type: sink_type.into(),
        }
    }

    /// Create a sink init error
    pub fn sink_init(name: impl Into<String>, source: ContractError) -> Self {
        Self::SinkInit {
            name: name.into(),
            source,
        }
    }
}
