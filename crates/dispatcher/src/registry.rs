//! SinkRegistry - sink constructors by type name
//!
//! Sinks are resolved by name at startup. An unknown type or a failed init
//! leaves that sink out of the active set; the rest still start.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use contracts::{AnalyticsSink, SinkConfig};
use tracing::{error, info, instrument};

use crate::error::DispatcherError;
use crate::handle::PumpHandle;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Builds an uninitialized sink given the configured sink name
pub type SinkConstructor = Arc<dyn Fn(&str) -> Box<dyn AnalyticsSink> + Send + Sync>;

/// Name -> constructor map
#[derive(Clone, Default)]
pub struct SinkRegistry {
    constructors: HashMap<String, SinkConstructor>,
}

impl SinkRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `log`, `file` and `network` sinks
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("log", |name| Box::new(LogSink::new(name)));
        registry.register("file", |name| Box::new(FileSink::new(name)));
        registry.register("network", |name| Box::new(NetworkSink::new(name)));
        registry
    }

    /// Register (or replace) a constructor
    pub fn register<F>(&mut self, sink_type: impl Into<String>, constructor: F)
    where
        F: Fn(&str) -> Box<dyn AnalyticsSink> + Send + Sync + 'static,
    {
        self.constructors
            .insert(sink_type.into(), Arc::new(constructor));
    }

    pub fn contains(&self, sink_type: &str) -> bool {
        self.constructors.contains_key(sink_type)
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Construct the sink a config refers to, without initializing it
    pub fn create(&self, config: &SinkConfig) -> Result<Box<dyn AnalyticsSink>, DispatcherError> {
        let sink_type = config.resolved_type();
        let constructor = self
            .constructors
            .get(sink_type)
            .ok_or_else(|| DispatcherError::unknown_sink_type(&config.name, sink_type))?;
        Ok(constructor(&config.name))
    }

    /// Construct and initialize a sink, binding it to its common settings
    #[instrument(
        name = "registry_build_handle",
        skip(self, config),
        fields(sink = %config.name, sink_type = config.resolved_type())
    )]
    pub async fn build_handle(&self, config: &SinkConfig) -> Result<PumpHandle, DispatcherError> {
        let mut sink = self.create(config)?;
        sink.init(&config.params)
            .await
            .map_err(|e| DispatcherError::sink_init(&config.name, e))?;
        Ok(PumpHandle::from_config(Arc::from(sink), config))
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("types", &self.names())
            .finish()
    }
}

/// Resolve every configured sink, skipping the ones that fail
///
/// Order of the returned handles follows the configuration.
#[instrument(name = "initialize_pumps", skip_all, fields(configured = configs.len()))]
pub async fn initialize_pumps(registry: &SinkRegistry, configs: &[SinkConfig]) -> Vec<PumpHandle> {
    let mut handles = Vec::with_capacity(configs.len());

    for config in configs {
        match registry.build_handle(config).await {
            Ok(handle) => {
                info!(
                    sink = %config.name,
                    sink_type = config.resolved_type(),
                    timeout_secs = config.timeout,
                    filtered = config.filters.has_filter(),
                    "Init Pump"
                );
                handles.push(handle);
            }
            Err(e @ DispatcherError::UnknownSinkType { .. }) => {
                error!(sink = %config.name, error = %e, "Pump load error (skipping)");
            }
            Err(e) => {
                error!(sink = %config.name, error = %e, "Pump init error (skipping)");
            }
        }
    }

    observability::record_active_sinks(handles.len());
    handles
}
