// Configuration file handling

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::codec::WireFormat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub emit: EmitConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub activation: ActivationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitConfig {
    /// Sinks that receive every published event
    #[serde(default = "default_sinks")]
    pub sinks: SinkSet,

    /// Wire format used for the transport, log file and rpc sinks
    #[serde(default)]
    pub format: WireFormat,

    /// Stream used by the console sink
    #[serde(default)]
    pub output_stream: OutputStream,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            sinks: default_sinks(),
            format: WireFormat::default(),
            output_stream: OutputStream::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Which side of the channel the monitor plays
    #[serde(default)]
    pub mode: TransportMode,

    /// Well-known endpoint name, or an explicit socket path
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// How long to wait for the peer, in milliseconds
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            endpoint: default_endpoint(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

impl TransportConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Event log file, appended to once per event
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_host")]
    pub host: String,

    #[serde(default = "default_rpc_port")]
    pub port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: default_rpc_host(),
            port: default_rpc_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActivationConfig {
    /// Only activate inside a process with this name
    #[serde(default)]
    pub required_runner: Option<String>,
}

/// A delivery target for serialized events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkKind {
    Transport,
    LogFile,
    Console,
    Rpc,
}

impl SinkKind {
    pub const ALL: [SinkKind; 4] = [
        SinkKind::Transport,
        SinkKind::LogFile,
        SinkKind::Console,
        SinkKind::Rpc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Transport => "transport",
            SinkKind::LogFile => "log-file",
            SinkKind::Console => "console",
            SinkKind::Rpc => "rpc",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SinkKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownSink(s.to_string()))
    }
}

/// The set of active sinks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<SinkKind>", into = "Vec<SinkKind>")]
pub struct SinkSet(BTreeSet<SinkKind>);

impl SinkSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, kind: SinkKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn insert(&mut self, kind: SinkKind) -> bool {
        self.0.insert(kind)
    }

    pub fn remove(&mut self, kind: SinkKind) -> bool {
        self.0.remove(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SinkKind> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<SinkKind> for SinkSet {
    fn from_iter<I: IntoIterator<Item = SinkKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<SinkKind>> for SinkSet {
    fn from(kinds: Vec<SinkKind>) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<SinkSet> for Vec<SinkKind> {
    fn from(set: SinkSet) -> Self {
        set.0.into_iter().collect()
    }
}

/// Where the console sink writes its summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    None,
    #[default]
    Stdout,
    Stderr,
    Trace,
    Debug,
}

/// Which side of the transport the monitor plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Bind the endpoint and wait for one consumer
    #[default]
    Server,
    /// Connect to a consumer that has bound the endpoint
    Client,
}

impl TransportMode {
    pub fn opposite(&self) -> Self {
        match self {
            TransportMode::Server => TransportMode::Client,
            TransportMode::Client => TransportMode::Server,
        }
    }
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            other => Err(ConfigError::Invalid(format!(
                "unknown transport mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown sink '{0}'")]
    UnknownSink(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// Default values
pub const ENV_TESTMONITOR_CONFIG: &str = "TESTMONITOR_CONFIG";
pub const DEFAULT_ENDPOINT: &str = "TestMonitorExtension";
const CONFIG_FILE_NAME: &str = ".testmonitor.toml";

fn default_sinks() -> SinkSet {
    [SinkKind::Transport, SinkKind::LogFile, SinkKind::Console]
        .into_iter()
        .collect()
}

pub fn default_endpoint() -> String {
    String::from(DEFAULT_ENDPOINT)
}

pub fn default_connection_timeout_ms() -> u64 {
    5000
}

pub fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("testmonitor")
        .join("events.log")
}

fn default_rpc_host() -> String {
    String::from("127.0.0.1")
}

fn default_rpc_port() -> u16 {
    50051
}

impl Config {
    /// Load configuration from default locations, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        // Check locations in order:
        // 1. $TESTMONITOR_CONFIG
        // 2. .testmonitor.toml (current directory)
        // 3. ~/.testmonitor.toml (home directory)
        if let Some(path) = std::env::var_os(ENV_TESTMONITOR_CONFIG) {
            return Self::load_from_file(Path::new(&path));
        }

        let candidates = [
            std::env::current_dir().ok().map(|cwd| cwd.join(CONFIG_FILE_NAME)),
            dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME)),
        ];

        for path in candidates.iter().flatten() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading configuration");
                return Self::load_from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Render configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Reject configurations the emitter cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sinks = &self.emit.sinks;

        if sinks.contains(SinkKind::LogFile) && self.log.file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "log-file sink is active but no log file is configured".to_string(),
            ));
        }

        if sinks.contains(SinkKind::Transport) && self.transport.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "transport sink is active but the endpoint is empty".to_string(),
            ));
        }

        if sinks.contains(SinkKind::Rpc) && self.rpc.port == 0 {
            return Err(ConfigError::Invalid(
                "rpc sink is active but the port is 0".to_string(),
            ));
        }

        Ok(())
    }
}
