//! NetworkSink - UDP fire-and-forget streaming

use contracts::{
    AnalyticsRecord, AnalyticsSink, BoxFuture, ContractError, RecordBatch, SinkParams,
    WriteContext,
};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, debug_span, error, warn, Instrument};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max datagram size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &SinkParams) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", raw, e))?,
            None => 65000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Sink that sends one datagram per record over UDP
///
/// Params: `addr` (required), `format` (`json` | `bincode`),
/// `max_packet_size`. Oversized records are skipped, send errors are logged
/// and do not fail the write.
pub struct NetworkSink {
    name: String,
    config: Option<NetworkSinkConfig>,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    /// Create an unconnected NetworkSink
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: None,
            socket: None,
        }
    }

    fn serialize_record(
        &self,
        format: NetworkFormat,
        record: &AnalyticsRecord,
    ) -> Result<Vec<u8>, ContractError> {
        match format {
            NetworkFormat::Json => serde_json::to_vec(record)
                .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {}", e))),
            NetworkFormat::Bincode => bincode::serialize(record).map_err(|e| {
                ContractError::sink_write(&self.name, format!("bincode error: {}", e))
            }),
        }
    }

    fn connection(&self) -> Result<(&UdpSocket, &NetworkSinkConfig), ContractError> {
        match (&self.socket, &self.config) {
            (Some(socket), Some(config)) => Ok((socket, config)),
            _ => Err(ContractError::sink_write(&self.name, "socket not connected")),
        }
    }

    async fn transmit(&self, socket: &UdpSocket, data: &[u8], timestamp: i64) -> bool {
        match socket.send(data).await {
            Ok(sent) => {
                debug!(sink = %self.name, timestamp, bytes = sent, "Sent");
                true
            }
            Err(e) => {
                // UDP is best-effort
                error!(sink = %self.name, error = %e, "UDP send failed");
                false
            }
        }
    }
}

impl AnalyticsSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn init<'a>(&'a mut self, params: &'a SinkParams) -> BoxFuture<'a, Result<(), ContractError>> {
        Box::pin(async move {
            let config = NetworkSinkConfig::from_params(params)
                .map_err(|e| ContractError::sink_init(&self.name, e))?;

            let bind_addr = if config.addr.is_ipv4() {
                "0.0.0.0:0"
            } else {
                "[::]:0"
            };
            let socket = UdpSocket::bind(bind_addr).await.map_err(|e| {
                ContractError::SinkConnection {
                    sink_name: self.name.clone(),
                    message: e.to_string(),
                }
            })?;
            socket
                .connect(config.addr)
                .await
                .map_err(|e| ContractError::SinkConnection {
                    sink_name: self.name.clone(),
                    message: e.to_string(),
                })?;

            debug!(sink = %self.name, target = %config.addr, "NetworkSink connected");

            self.config = Some(config);
            self.socket = Some(socket);
            Ok(())
        })
    }

    fn write_data<'a>(
        &'a self,
        ctx: &'a WriteContext,
        records: RecordBatch,
    ) -> BoxFuture<'a, Result<(), ContractError>> {
        let span = debug_span!("network_sink_write", sink = %self.name, records = records.len());
        Box::pin(
            async move {
                let (socket, config) = self.connection()?;
                let mut sent = 0usize;

                for record in records.iter() {
                    if let Some(reason) = ctx.err() {
                        return Err(ContractError::sink_write(
                            &self.name,
                            format!("{reason} after {sent} datagrams"),
                        ));
                    }

                    let data = self.serialize_record(config.format, record)?;
                    if data.len() > config.max_packet_size {
                        warn!(
                            sink = %self.name,
                            size = data.len(),
                            max = config.max_packet_size,
                            "Record too large for one datagram, skipping"
                        );
                        continue;
                    }

                    if self.transmit(socket, &data, record.timestamp).await {
                        sent += 1;
                    }
                }

                debug!(sink = %self.name, sent, "Batch transmitted");
                Ok(())
            }
            .instrument(span),
        )
    }
}
