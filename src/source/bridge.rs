//! TCP adapter to an external simulator bridge process.
//!
//! The bridge owns the simulator session; this adapter speaks one JSON object
//! per line in each direction. Requests carry an `op` tag, responses are
//! `{"ok": bool, "value": ..., "error": "..."}`.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::backend::{LaneMap, LiveBackend};
use super::error::SourceError;
use crate::intersection::{Direction, Phase};

/// Connection settings for [`BridgeBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `host:port` of the bridge.
    pub address: String,
    pub lanes: LaneMap,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8813".into(),
            lanes: LaneMap::default(),
            connect_timeout_ms: 2000,
            io_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    ReadQueue { lane: &'a str },
    PhaseSignal { tls: &'a str },
    SetPhase { tls: &'a str, index: u32 },
    Step,
    PendingVehicles,
    Close,
}

impl Request<'_> {
    fn operation(&self) -> &'static str {
        match self {
            Request::ReadQueue { .. } => "read_queue",
            Request::PhaseSignal { .. } => "read_phase_signal",
            Request::SetPhase { .. } => "set_phase",
            Request::Step => "advance",
            Request::PendingVehicles => "is_exhausted",
            Request::Close => "close",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// Live backend speaking JSON lines to a simulator bridge.
pub struct BridgeBackend {
    config: BridgeConfig,
    conn: Option<Connection>,
}

impl BridgeBackend {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config, conn: None }
    }

    fn call(&mut self, request: Request<'_>) -> Result<Value, SourceError> {
        let operation = request.operation();
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| SourceError::query(operation, "not connected"))?;

        let mut line =
            serde_json::to_string(&request).map_err(|e| SourceError::query(operation, e))?;
        line.push('\n');
        conn.writer
            .write_all(line.as_bytes())
            .and_then(|_| conn.writer.flush())
            .map_err(|e| SourceError::query(operation, e))?;

        let mut reply = String::new();
        let read = conn
            .reader
            .read_line(&mut reply)
            .map_err(|e| SourceError::query(operation, e))?;
        if read == 0 {
            return Err(SourceError::query(operation, "bridge closed the connection"));
        }

        let response: Response =
            serde_json::from_str(reply.trim()).map_err(|e| SourceError::query(operation, e))?;
        if !response.ok {
            let reason = response.error.unwrap_or_else(|| "unspecified error".into());
            return Err(SourceError::query(operation, reason));
        }
        Ok(response.value)
    }

    fn expect_u64(value: Value, operation: &str) -> Result<u64, SourceError> {
        value
            .as_u64()
            .ok_or_else(|| SourceError::query(operation, format!("expected integer, got {}", value)))
    }
}

impl LiveBackend for BridgeBackend {
    fn name(&self) -> &str {
        "bridge"
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        let addr = self
            .config
            .address
            .to_socket_addrs()
            .map_err(|e| SourceError::unavailable(self.name(), e))?
            .next()
            .ok_or_else(|| {
                SourceError::unavailable(self.name(), format!("cannot resolve {}", self.config.address))
            })?;

        let timeout = Duration::from_millis(self.config.connect_timeout_ms.max(1));
        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| SourceError::unavailable(self.name(), e))?;
        let io_timeout = Some(Duration::from_millis(self.config.io_timeout_ms.max(1)));
        stream
            .set_read_timeout(io_timeout)
            .and_then(|_| stream.set_write_timeout(io_timeout))
            .map_err(|e| SourceError::unavailable(self.name(), e))?;
        let writer = stream
            .try_clone()
            .map_err(|e| SourceError::unavailable(self.name(), e))?;

        debug!(address = %addr, "bridge connected");
        self.conn = Some(Connection {
            reader: BufReader::new(stream),
            writer,
        });
        Ok(())
    }

    fn read_queue(&mut self, direction: Direction) -> Result<u32, SourceError> {
        let lane = self.config.lanes.lane(direction).to_string();
        let value = self.call(Request::ReadQueue { lane: &lane })?;
        let count = Self::expect_u64(value, "read_queue")?;
        u32::try_from(count).map_err(|e| SourceError::query("read_queue", e))
    }

    fn read_phase_signal(&mut self) -> Result<String, SourceError> {
        let tls = self.config.lanes.traffic_light.clone();
        match self.call(Request::PhaseSignal { tls: &tls })? {
            Value::String(signal) => Ok(signal),
            other => Err(SourceError::query(
                "read_phase_signal",
                format!("expected string, got {}", other),
            )),
        }
    }

    fn set_phase(&mut self, phase: Phase) -> Result<(), SourceError> {
        let tls = self.config.lanes.traffic_light.clone();
        self.call(Request::SetPhase {
            tls: &tls,
            index: phase.signal_index(),
        })
        .map(|_| ())
    }

    fn advance(&mut self) -> Result<(), SourceError> {
        self.call(Request::Step).map(|_| ())
    }

    fn is_exhausted(&mut self) -> Result<bool, SourceError> {
        let value = self.call(Request::PendingVehicles)?;
        Ok(Self::expect_u64(value, "is_exhausted")? == 0)
    }

    fn close(&mut self) {
        if self.conn.is_some() {
            let _ = self.call(Request::Close);
        }
        if let Some(conn) = self.conn.take() {
            let _ = conn.writer.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for BridgeBackend {
    fn drop(&mut self) {
        self.close();
    }
}
