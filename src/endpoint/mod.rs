//! Output endpoints consuming the muxed byte stream.
//!
//! The pipeline holds exactly one [`Endpoint`], chosen once from an
//! [`EndpointConfig`] when streaming is set up.

mod file;
mod network;

pub use file::FileEndpoint;
pub use network::{NetworkEndpoint, Transport, UDP_DATAGRAM_SIZE};

use crate::error::{Result, TsflowError};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Destination of the TS byte stream.
#[async_trait]
pub trait Endpoint: Send {
    /// Opens the file or connects the socket.
    async fn open(&mut self) -> Result<()>;

    /// Writes a run of whole TS packets.
    async fn write(&mut self, data: Bytes) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    /// Whether a failed write means a lost connection.
    fn is_connection_oriented(&self) -> bool {
        false
    }

    /// Human-readable target, used in logs and errors.
    fn describe(&self) -> String;
}

/// Which endpoint to build, parsed from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointConfig {
    File {
        path: PathBuf,
    },
    Network {
        transport: Transport,
        host: String,
        port: u16,
    },
}

impl EndpointConfig {
    /// Accepts `file:///path/out.ts`, `tcp://host:port` and `udp://host:port`.
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| TsflowError::Configuration(format!("Invalid URL: {}", e)))?;

        let transport = match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|_| {
                    TsflowError::Configuration(format!("Invalid file URL: {}", url))
                })?;
                return Ok(EndpointConfig::File { path });
            }
            "tcp" => Transport::Tcp,
            "udp" => Transport::Udp,
            other => {
                return Err(TsflowError::Configuration(format!(
                    "Unsupported endpoint scheme: {}",
                    other
                )))
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| TsflowError::Configuration("No host in URL".into()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url
            .port()
            .ok_or_else(|| TsflowError::Configuration("No port in URL".into()))?;
        Ok(EndpointConfig::Network {
            transport,
            host,
            port,
        })
    }

    pub fn build(&self) -> Box<dyn Endpoint> {
        match self {
            EndpointConfig::File { path } => Box::new(FileEndpoint::new(path.clone())),
            EndpointConfig::Network {
                transport,
                host,
                port,
            } => Box::new(NetworkEndpoint::new(*transport, host.clone(), *port)),
        }
    }
}

impl FromStr for EndpointConfig {
    type Err = TsflowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
