//! TCP upstream transport (RFC 1035 §4.2.2): 2-byte length prefix before
//! each message. One connection per query.

use sentinel_dns_domain::DomainError;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

/// Maximum framed DNS message size.
pub(crate) const MAX_TCP_MESSAGE_SIZE: usize = 65535;

pub struct TcpTransport {
    server_addr: SocketAddr,
}

impl TcpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }

    pub async fn send(&self, message: &[u8], deadline: Instant) -> Result<Vec<u8>, DomainError> {
        let mut stream = tokio::time::timeout_at(deadline, TcpStream::connect(self.server_addr))
            .await
            .map_err(|_| self.timeout())?
            .map_err(|e| DomainError::UpstreamIo(format!("connect {}: {}", self.server_addr, e)))?;

        tokio::time::timeout_at(deadline, write_framed(&mut stream, message))
            .await
            .map_err(|_| self.timeout())??;

        debug!(server = %self.server_addr, message_len = message.len(), "TCP query sent");

        let response = tokio::time::timeout_at(deadline, read_framed(&mut stream))
            .await
            .map_err(|_| self.timeout())??;

        debug!(server = %self.server_addr, response_len = response.len(), "TCP response received");
        Ok(response)
    }

    fn timeout(&self) -> DomainError {
        DomainError::UpstreamTimeout { server: self.server_addr.to_string() }
    }
}

/// Write one length-prefixed DNS message (shared with the DoT transport).
pub(crate) async fn write_framed<S>(stream: &mut S, message: &[u8]) -> Result<(), DomainError>
where
    S: AsyncWriteExt + Unpin,
{
    if message.len() > MAX_TCP_MESSAGE_SIZE {
        return Err(DomainError::Encode(format!("message too large: {} bytes", message.len())));
    }
    let length = (message.len() as u16).to_be_bytes();
    stream
        .write_all(&length)
        .await
        .map_err(|e| DomainError::UpstreamIo(format!("write length prefix: {}", e)))?;
    stream
        .write_all(message)
        .await
        .map_err(|e| DomainError::UpstreamIo(format!("write message: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| DomainError::UpstreamIo(format!("flush: {}", e)))?;
    Ok(())
}

/// Read one length-prefixed DNS message (shared with the DoT transport).
pub(crate) async fn read_framed<S>(stream: &mut S) -> Result<Vec<u8>, DomainError>
where
    S: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| DomainError::UpstreamIo(format!("read length prefix: {}", e)))?;

    let response_len = u16::from_be_bytes(len_buf) as usize;
    let mut response = vec![0u8; response_len];
    stream
        .read_exact(&mut response)
        .await
        .map_err(|e| DomainError::UpstreamIo(format!("read message body: {}", e)))?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_prefix_encoding() {
        let len: u16 = 300;
        let bytes = len.to_be_bytes();
        assert_eq!(bytes, [1, 44]); // 300 = 0x012C
        assert_eq!(u16::from_be_bytes(bytes), 300);
    }

    #[tokio::test]
    async fn test_framed_roundtrip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let message = vec![0xAB; 40];

        write_framed(&mut client, &message).await.unwrap();
        let received = read_framed(&mut server).await.unwrap();
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_write_framed_rejects_oversize() {
        let (mut client, _server) = tokio::io::duplex(1024);
        let message = vec![0u8; MAX_TCP_MESSAGE_SIZE + 1];
        assert!(write_framed(&mut client, &message).await.is_err());
    }
}
