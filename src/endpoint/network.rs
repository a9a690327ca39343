use super::Endpoint;
use crate::error::{Result, TsflowError};
use crate::format::ts::TS_PACKET_SIZE;
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream, UdpSocket};

/// Seven TS packets, the usual payload of one live UDP datagram.
pub const UDP_DATAGRAM_SIZE: usize = 7 * TS_PACKET_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug)]
enum Connection {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

/// Pushes the stream to a remote peer over TCP or UDP.
#[derive(Debug)]
pub struct NetworkEndpoint {
    transport: Transport,
    host: String,
    port: u16,
    connection: Option<Connection>,
}

impl NetworkEndpoint {
    pub fn new(transport: Transport, host: impl Into<String>, port: u16) -> Self {
        Self {
            transport,
            host: host.into(),
            port,
            connection: None,
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| TsflowError::Endpoint(format!("Failed to resolve {}: {}", self.host, e)))?
            .next()
            .ok_or_else(|| TsflowError::Endpoint(format!("No address for {}", self.host)))
    }
}

#[async_trait]
impl Endpoint for NetworkEndpoint {
    async fn open(&mut self) -> Result<()> {
        let addr = self.resolve().await?;
        let connection = match self.transport {
            Transport::Tcp => {
                let stream = TcpStream::connect(addr).await.map_err(|e| {
                    TsflowError::Endpoint(format!("Failed to connect to {}: {}", addr, e))
                })?;
                stream.set_nodelay(true)?;
                Connection::Tcp(stream)
            }
            Transport::Udp => {
                let local: SocketAddr = if addr.is_ipv4() {
                    (Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (Ipv6Addr::UNSPECIFIED, 0).into()
                };
                let socket = UdpSocket::bind(local).await?;
                socket.connect(addr).await?;
                Connection::Udp(socket)
            }
        };
        self.connection = Some(connection);
        info!("Connected to {}", self.describe());
        Ok(())
    }

    async fn write(&mut self, data: Bytes) -> Result<()> {
        let target = self.describe();
        match self.connection.as_mut() {
            Some(Connection::Tcp(stream)) => {
                stream.write_all(&data).await?;
                Ok(())
            }
            Some(Connection::Udp(socket)) => {
                for datagram in data.chunks(UDP_DATAGRAM_SIZE) {
                    let sent = socket.send(datagram).await?;
                    if sent != datagram.len() {
                        return Err(TsflowError::Endpoint(format!(
                            "short datagram to {}: {} of {} bytes",
                            target,
                            sent,
                            datagram.len()
                        )));
                    }
                }
                Ok(())
            }
            None => Err(TsflowError::Endpoint(format!("{} is not connected", target))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.connection.take() {
            Some(Connection::Tcp(mut stream)) => {
                stream.shutdown().await?;
                info!("Disconnected from {}", self.describe());
            }
            Some(Connection::Udp(_)) => debug!("Closed socket to {}", self.describe()),
            None => {}
        }
        Ok(())
    }

    fn is_connection_oriented(&self) -> bool {
        self.transport == Transport::Tcp
    }

    fn describe(&self) -> String {
        if self.host.contains(':') {
            format!("{}://[{}]:{}", self.transport, self.host, self.port)
        } else {
            format!("{}://{}:{}", self.transport, self.host, self.port)
        }
    }
}
