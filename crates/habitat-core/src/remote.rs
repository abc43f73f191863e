//! TCP implementation of [`SimulationGateway`].
//!
//! The simulation bridge speaks newline-delimited JSON over a single TCP
//! connection, one request in flight at a time:
//!
//! ```text
//! -> {"id":7,"op":"get_float_signal","name":"SCOUT-1_battery"}
//! <- {"id":7,"status":"ok","value":87.5}
//! <- {"id":7,"status":"missing"}
//! <- {"id":7,"status":"error","message":"unknown signal type"}
//! ```
//!
//! Operations are `get_object_handle {name}`, `get_object_position
//! {handle}`, `get_float_signal {name}` and `get_string_signal {name}`.
//!
//! # Connection lifecycle
//!
//! [`RemoteSimGateway::connect`] always tears down any existing connection
//! before dialing. After a transport failure (I/O error, timeout, or a
//! response that cannot be matched to its request) the connection is
//! dropped, because the stream may hold a late answer that would be
//! mistaken for the next one. The next query redials once; object handles
//! stay valid because the scene outlives the connection.

use std::time::Duration;

use habitat_types::RobotHandle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::gateway::{ConnectionError, ReadError, SimPosition, SimulationGateway};

/// A query sent to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Query<'a> {
    GetObjectHandle { name: &'a str },
    GetObjectPosition { handle: RobotHandle },
    GetFloatSignal { name: &'a str },
    GetStringSignal { name: &'a str },
}

impl Query<'_> {
    const fn op(&self) -> &'static str {
        match self {
            Self::GetObjectHandle { .. } => "get_object_handle",
            Self::GetObjectPosition { .. } => "get_object_position",
            Self::GetFloatSignal { .. } => "get_float_signal",
            Self::GetStringSignal { .. } => "get_string_signal",
        }
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    query: &'a Query<'a>,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Outcome {
    Ok { value: Value },
    Missing,
    Error { message: String },
}

/// One live TCP connection to the simulation bridge.
#[derive(Debug)]
pub struct SimConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
    request_timeout: Duration,
}

impl SimConnection {
    /// Dial the bridge described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the connect fails or times out.
    pub async fn open(config: &SimulationConfig) -> Result<Self, ConnectionError> {
        let address = config.address();
        let connect = TcpStream::connect(address.as_str());
        let stream = tokio::time::timeout(Duration::from_millis(config.connect_timeout_ms), connect)
            .await
            .map_err(|_elapsed| ConnectionError::Timeout {
                address: address.clone(),
                timeout_ms: config.connect_timeout_ms,
            })?
            .map_err(|e| ConnectionError::Connect {
                address: address.clone(),
                message: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle on simulator socket");
        }

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_id: 1,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    /// Send one query and wait for its answer.
    ///
    /// Returns `Ok(None)` for a `missing` response.
    async fn round_trip(&mut self, query: &Query<'_>) -> Result<Option<Value>, ReadError> {
        let op = query.op();
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let mut line = serde_json::to_string(&Request { id, query }).map_err(|e| {
            ReadError::Protocol {
                op,
                message: format!("failed to encode request: {e}"),
            }
        })?;
        line.push('\n');

        let request_timeout = self.request_timeout;
        let timeout_ms = u64::try_from(request_timeout.as_millis()).unwrap_or(u64::MAX);
        let reader = &mut self.reader;
        let writer = &mut self.writer;
        let exchange = async move {
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| ReadError::Io {
                    op,
                    message: e.to_string(),
                })?;

            let mut reply = String::new();
            let read = reader
                .read_line(&mut reply)
                .await
                .map_err(|e| ReadError::Io {
                    op,
                    message: e.to_string(),
                })?;
            if read == 0 {
                return Err(ReadError::Io {
                    op,
                    message: String::from("connection closed by simulator"),
                });
            }
            Ok(reply)
        };

        let reply = tokio::time::timeout(request_timeout, exchange)
            .await
            .map_err(|_elapsed| ReadError::Timeout { op, timeout_ms })??;

        let response: Response =
            serde_json::from_str(reply.trim_end()).map_err(|e| ReadError::Protocol {
                op,
                message: format!("malformed response: {e}"),
            })?;

        if response.id != id {
            return Err(ReadError::Protocol {
                op,
                message: format!("expected response {id}, got {}", response.id),
            });
        }

        match response.outcome {
            Outcome::Ok { value } => Ok(Some(value)),
            Outcome::Missing => Ok(None),
            Outcome::Error { message } => Err(ReadError::Rejected { op, message }),
        }
    }

    /// Close the write side so the bridge sees an orderly shutdown.
    async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!(error = %e, "simulator socket shutdown failed");
        }
    }
}

/// [`SimulationGateway`] backed by the TCP simulation bridge.
#[derive(Debug)]
pub struct RemoteSimGateway {
    config: SimulationConfig,
    connection: Option<SimConnection>,
}

impl RemoteSimGateway {
    /// Create a gateway for `config` without connecting.
    pub const fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    /// Create a gateway and connect it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the simulator is unreachable.
    pub async fn connect_to(config: SimulationConfig) -> Result<Self, ConnectionError> {
        let mut gateway = Self::new(config);
        gateway.connect().await?;
        Ok(gateway)
    }

    /// Establish a fresh connection, closing any existing one first.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the simulator is unreachable. The
    /// gateway is left disconnected in that case.
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        self.disconnect().await;
        let connection = SimConnection::open(&self.config).await?;
        info!(address = %self.config.address(), "Connected to simulator");
        self.connection = Some(connection);
        Ok(())
    }

    /// Close the connection if one is open.
    pub async fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close().await;
            debug!(address = %self.config.address(), "Simulator connection closed");
        }
    }

    /// Whether a connection is currently held.
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    async fn query(&mut self, query: &Query<'_>) -> Result<Option<Value>, ReadError> {
        if self.connection.is_none() {
            warn!(address = %self.config.address(), "Simulator connection lost, redialing");
            self.connect().await?;
        }
        let Some(connection) = self.connection.as_mut() else {
            return Err(ReadError::Io {
                op: query.op(),
                message: String::from("no simulator connection"),
            });
        };

        let result = connection.round_trip(query).await;
        if let Err(e) = &result {
            if poisons_stream(e) {
                warn!(error = %e, "Dropping simulator connection after transport failure");
                self.disconnect().await;
            }
        }
        result
    }
}

/// Whether an error leaves the byte stream in an unknown state.
const fn poisons_stream(error: &ReadError) -> bool {
    matches!(
        error,
        ReadError::Io { .. } | ReadError::Timeout { .. } | ReadError::Protocol { .. }
    )
}

fn decode<T: serde::de::DeserializeOwned>(op: &'static str, value: Value) -> Result<T, ReadError> {
    serde_json::from_value(value).map_err(|e| ReadError::Protocol {
        op,
        message: format!("unexpected value type: {e}"),
    })
}

impl SimulationGateway for RemoteSimGateway {
    async fn resolve_handle(&mut self, name: &str) -> Result<Option<RobotHandle>, ReadError> {
        let query = Query::GetObjectHandle { name };
        self.query(&query)
            .await?
            .map(|value| decode::<i64>(query.op(), value).map(RobotHandle))
            .transpose()
    }

    async fn read_position(&mut self, handle: RobotHandle) -> Result<SimPosition, ReadError> {
        let query = Query::GetObjectPosition { handle };
        match self.query(&query).await? {
            Some(value) => decode::<[f64; 3]>(query.op(), value).map(SimPosition::from),
            None => Err(ReadError::UnknownObject { handle }),
        }
    }

    async fn read_float_signal(&mut self, name: &str) -> Result<Option<f64>, ReadError> {
        let query = Query::GetFloatSignal { name };
        self.query(&query)
            .await?
            .map(|value| decode::<f64>(query.op(), value))
            .transpose()
    }

    async fn read_string_signal(&mut self, name: &str) -> Result<Option<String>, ReadError> {
        let query = Query::GetStringSignal { name };
        self.query(&query)
            .await?
            .map(|value| decode::<String>(query.op(), value))
            .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use super::*;

    /// Answer each request with the next canned reply, echoing the request id.
    ///
    /// A reply of `None` closes the connection instead of answering.
    async fn fake_bridge(replies: Vec<Option<Value>>) -> (SimulationConfig, tokio::task::JoinHandle<Vec<Value>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let mut seen = Vec::new();

            for reply in replies {
                let Some(line) = lines.next_line().await.unwrap() else {
                    break;
                };
                let request: Value = serde_json::from_str(&line).unwrap();
                let id = request["id"].clone();
                seen.push(request);
                let Some(mut reply) = reply else {
                    break;
                };
                reply["id"] = id;
                let mut out = reply.to_string();
                out.push('\n');
                write_half.write_all(out.as_bytes()).await.unwrap();
            }
            seen
        });

        let config = SimulationConfig {
            host: String::from("127.0.0.1"),
            port,
            connect_timeout_ms: 1_000,
            request_timeout_ms: 1_000,
        };
        (config, handle)
    }

    #[tokio::test]
    async fn reads_each_query_kind() {
        let (config, bridge) = fake_bridge(vec![
            Some(json!({"status": "ok", "value": 17})),
            Some(json!({"status": "ok", "value": [1.5, -0.25, 0.1]})),
            Some(json!({"status": "ok", "value": 64.9})),
            Some(json!({"status": "ok", "value": "charging"})),
        ])
        .await;

        let mut gateway = RemoteSimGateway::connect_to(config).await.unwrap();
        let handle = gateway.resolve_handle("SCOUT-1").await.unwrap();
        assert_eq!(handle, Some(RobotHandle(17)));

        let position = gateway.read_position(RobotHandle(17)).await.unwrap();
        assert_eq!(position, SimPosition { x: 1.5, y: -0.25, z: 0.1 });

        let battery = gateway.read_float_signal("SCOUT-1_battery").await.unwrap();
        assert_eq!(battery, Some(64.9));

        let status = gateway.read_string_signal("SCOUT-1_status").await.unwrap();
        assert_eq!(status.as_deref(), Some("charging"));

        let seen = bridge.await.unwrap();
        assert_eq!(seen[0]["op"], "get_object_handle");
        assert_eq!(seen[0]["name"], "SCOUT-1");
        assert_eq!(seen[1]["op"], "get_object_position");
        assert_eq!(seen[1]["handle"], 17);
        assert_eq!(seen[2]["op"], "get_float_signal");
        assert_eq!(seen[3]["op"], "get_string_signal");
    }

    #[tokio::test]
    async fn missing_is_none_not_error() {
        let (config, _bridge) = fake_bridge(vec![
            Some(json!({"status": "missing"})),
            Some(json!({"status": "missing"})),
            Some(json!({"status": "missing"})),
        ])
        .await;

        let mut gateway = RemoteSimGateway::connect_to(config).await.unwrap();
        assert_eq!(gateway.resolve_handle("GHOST-9").await.unwrap(), None);
        assert_eq!(gateway.read_float_signal("O2_level").await.unwrap(), None);
        assert_eq!(gateway.read_string_signal("SCOUT-1_status").await.unwrap(), None);
        assert!(gateway.is_connected());
    }

    #[tokio::test]
    async fn missing_position_is_an_error() {
        let (config, _bridge) = fake_bridge(vec![Some(json!({"status": "missing"}))]).await;

        let mut gateway = RemoteSimGateway::connect_to(config).await.unwrap();
        let result = gateway.read_position(RobotHandle(3)).await;
        assert!(matches!(result, Err(ReadError::UnknownObject { handle: RobotHandle(3) })));
    }

    #[tokio::test]
    async fn rejection_keeps_connection() {
        let (config, _bridge) = fake_bridge(vec![
            Some(json!({"status": "error", "message": "bad signal"})),
            Some(json!({"status": "ok", "value": 21.0})),
        ])
        .await;

        let mut gateway = RemoteSimGateway::connect_to(config).await.unwrap();
        let first = gateway.read_float_signal("O2_level").await;
        assert!(matches!(first, Err(ReadError::Rejected { .. })));
        assert!(gateway.is_connected());

        let second = gateway.read_float_signal("O2_level").await.unwrap();
        assert_eq!(second, Some(21.0));
    }

    #[tokio::test]
    async fn wrong_value_type_is_protocol_error() {
        let (config, _bridge) = fake_bridge(vec![Some(json!({"status": "ok", "value": "lots"}))]).await;

        let mut gateway = RemoteSimGateway::connect_to(config).await.unwrap();
        let result = gateway.read_float_signal("Pressure").await;
        assert!(matches!(result, Err(ReadError::Protocol { .. })));
        assert!(!gateway.is_connected());
    }

    #[tokio::test]
    async fn closed_socket_drops_connection() {
        let (config, _bridge) = fake_bridge(vec![None]).await;

        let mut gateway = RemoteSimGateway::connect_to(config).await.unwrap();
        let result = gateway.read_position(RobotHandle(1)).await;
        assert!(matches!(result, Err(ReadError::Io { .. })));
        assert!(!gateway.is_connected());
    }

    #[tokio::test]
    async fn connect_failure_is_connection_error() {
        // Grab a free port, then release it so nothing is listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = SimulationConfig {
            host: String::from("127.0.0.1"),
            port,
            connect_timeout_ms: 1_000,
            request_timeout_ms: 1_000,
        };
        let result = RemoteSimGateway::connect_to(config).await;
        assert!(matches!(result, Err(ConnectionError::Connect { .. })));
    }

    #[tokio::test]
    async fn reconnect_replaces_existing_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepts = tokio::spawn(async move {
            let (_first, _) = listener.accept().await.unwrap();
            let (_second, _) = listener.accept().await.unwrap();
        });

        let config = SimulationConfig {
            host: String::from("127.0.0.1"),
            port,
            connect_timeout_ms: 1_000,
            request_timeout_ms: 1_000,
        };
        let mut gateway = RemoteSimGateway::connect_to(config).await.unwrap();
        assert!(gateway.connect().await.is_ok());
        assert!(gateway.is_connected());
        accepts.await.unwrap();
    }
}
