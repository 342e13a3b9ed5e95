//! The container capability set a wait strategy probes.
//!
//! Strategies never mutate a target. They read its lifecycle state and
//! logs, run commands inside it, and resolve its network endpoints.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::context::WaitContext;
use crate::error::WaitResult;

/// Readable byte stream returned for logs and exec output.
pub type LogStream = Box<dyn AsyncRead + Send + Unpin>;

/// Mapping of exposed container ports to their host bindings.
pub type PortMap = BTreeMap<Port, Vec<PortBinding>>;

/// Lifecycle status reported by the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    /// A status this crate does not know about.
    Other(String),
}

impl ContainerStatus {
    /// Runtime name of the status.
    pub fn as_str(&self) -> &str {
        match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Restarting => "restarting",
            ContainerStatus::Removing => "removing",
            ContainerStatus::Exited => "exited",
            ContainerStatus::Dead => "dead",
            ContainerStatus::Other(status) => status,
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ContainerStatus {
    fn from(status: &str) -> Self {
        match status {
            "created" => ContainerStatus::Created,
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            "restarting" => ContainerStatus::Restarting,
            "removing" => ContainerStatus::Removing,
            "exited" => ContainerStatus::Exited,
            "dead" => ContainerStatus::Dead,
            other => ContainerStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for ContainerStatus {
    fn from(status: String) -> Self {
        ContainerStatus::from(status.as_str())
    }
}

impl From<ContainerStatus> for String {
    fn from(status: ContainerStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Snapshot of a container's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    /// Reported status.
    pub status: ContainerStatus,

    /// Whether the main process is running.
    pub running: bool,
}

impl ContainerState {
    /// Create a state snapshot.
    pub fn new(status: impl Into<ContainerStatus>, running: bool) -> Self {
        Self {
            status: status.into(),
            running,
        }
    }

    /// A running container.
    pub fn running() -> Self {
        Self::new(ContainerStatus::Running, true)
    }
}

/// Network protocol of an exposed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Sctp => write!(f, "sctp"),
        }
    }
}

/// An exposed container port, written as `8080/tcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Port {
    pub number: u16,
    pub protocol: Protocol,
}

impl Port {
    /// A TCP port.
    pub fn tcp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Tcp,
        }
    }

    /// A UDP port.
    pub fn udp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Udp,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

/// Error returned when a port specification cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid port {0:?}")]
pub struct ParsePortError(String);

impl FromStr for Port {
    type Err = ParsePortError;

    /// Parses `8080`, `8080/tcp`, `53/udp` or `9/sctp`. A bare number is TCP.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, protocol) = match s.split_once('/') {
            Some((number, protocol)) => (number, protocol),
            None => (s, "tcp"),
        };

        let number = number
            .trim()
            .parse::<u16>()
            .map_err(|_| ParsePortError(s.to_string()))?;

        let protocol = match protocol.trim().to_ascii_lowercase().as_str() {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            "sctp" => Protocol::Sctp,
            _ => return Err(ParsePortError(s.to_string())),
        };

        Ok(Self { number, protocol })
    }
}

/// A host side binding of an exposed port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

impl PortBinding {
    pub fn new(host_ip: impl Into<String>, host_port: impl Into<String>) -> Self {
        Self {
            host_ip: host_ip.into(),
            host_port: host_port.into(),
        }
    }
}

/// Result of running a command inside a container.
pub struct ExecOutput {
    /// Process exit code.
    pub exit_code: i64,

    /// Combined output, when the runtime captured it.
    pub output: Option<LogStream>,
}

impl ExecOutput {
    /// An exec result without captured output.
    pub fn code(exit_code: i64) -> Self {
        Self {
            exit_code,
            output: None,
        }
    }

    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl fmt::Debug for ExecOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOutput")
            .field("exit_code", &self.exit_code)
            .field("output", &self.output.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Capabilities of a container that wait strategies may use.
#[async_trait]
pub trait StrategyTarget: Send + Sync {
    /// Host name or IP the container is reachable on.
    async fn host(&self, ctx: &WaitContext) -> WaitResult<String>;

    /// Host port bound to an exposed container port.
    async fn mapped_port(&self, ctx: &WaitContext, port: &Port) -> WaitResult<Port>;

    /// Container logs, if the runtime keeps any.
    async fn logs(&self, ctx: &WaitContext) -> WaitResult<Option<LogStream>>;

    /// Run a command inside the container.
    async fn exec(&self, ctx: &WaitContext, cmd: &[String]) -> WaitResult<ExecOutput>;

    /// All exposed ports and their bindings.
    async fn ports(&self, ctx: &WaitContext) -> WaitResult<PortMap>;

    /// Current lifecycle state.
    async fn state(&self, ctx: &WaitContext) -> WaitResult<ContainerState>;
}
