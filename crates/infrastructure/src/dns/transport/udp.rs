//! UDP upstream transport (RFC 1035 §4.2.1).
//!
//! Messages are sent as-is, no framing. Each query owns an ephemeral
//! socket released on every exit path.

use sentinel_dns_domain::DomainError;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Response ceiling with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

pub struct UdpTransport {
    server_addr: SocketAddr,
}

impl UdpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }

    pub async fn send(&self, message: &[u8], deadline: Instant) -> Result<Vec<u8>, DomainError> {
        let bind_addr: SocketAddr = if self.server_addr.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| DomainError::UpstreamIo(format!("bind: {}", e)))?;

        tokio::time::timeout_at(deadline, socket.send_to(message, self.server_addr))
            .await
            .map_err(|_| self.timeout())?
            .map_err(|e| DomainError::UpstreamIo(format!("send to {}: {}", self.server_addr, e)))?;

        let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            let (len, from) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf))
                .await
                .map_err(|_| self.timeout())?
                .map_err(|e| {
                    DomainError::UpstreamIo(format!("recv from {}: {}", self.server_addr, e))
                })?;

            if from.ip() != self.server_addr.ip() {
                warn!(expected = %self.server_addr, received_from = %from, "UDP response from unexpected source");
                continue;
            }

            buf.truncate(len);
            debug!(server = %self.server_addr, bytes = len, "UDP response received");
            return Ok(buf);
        }
    }

    fn timeout(&self) -> DomainError {
        DomainError::UpstreamTimeout { server: self.server_addr.to_string() }
    }
}
