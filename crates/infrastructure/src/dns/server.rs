//! UDP and TCP listeners on the DNS port.
//!
//! One socket pair per address family; dual-stack mode binds `0.0.0.0` and
//! `[::]` (v6-only) side by side. Every datagram and every framed TCP query
//! becomes its own task; queries on one TCP connection are answered in
//! arrival order.

use crate::dns::pipeline::QueryPipeline;
use sentinel_dns_domain::{BindMode, DomainError, ListenerTransport};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const MAX_UDP_PACKET: usize = 4096;
const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind every socket for the configured mode and spawn the accept loops.
/// Binding failure is fatal and propagates out before any loop starts.
pub fn spawn_listeners(
    pipeline: Arc<QueryPipeline>,
    bind_mode: BindMode,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> Result<Vec<JoinHandle<()>>, DomainError> {
    let binds: Vec<(SocketAddr, bool)> = match bind_mode {
        BindMode::Ipv4 => vec![(SocketAddr::new(parse_host(host, false)?, port), false)],
        BindMode::Ipv6 => vec![(SocketAddr::new(parse_host(host, true)?, port), true)],
        BindMode::Dual => vec![
            (SocketAddr::new(IpAddr::from([0u8; 4]), port), false),
            (SocketAddr::new(IpAddr::from([0u16; 8]), port), true),
        ],
    };

    let mut handles = Vec::with_capacity(binds.len() * 2);
    for (addr, v6_only) in binds {
        let udp = create_udp_socket(addr, v6_only)?;
        let tcp = create_tcp_listener(addr, v6_only)?;
        info!(bind = %addr, "DNS listeners bound");

        handles.push(tokio::spawn(run_udp(
            Arc::new(udp),
            Arc::clone(&pipeline),
            shutdown.clone(),
        )));
        handles.push(tokio::spawn(run_tcp(tcp, Arc::clone(&pipeline), shutdown.clone())));
    }

    Ok(handles)
}

fn parse_host(host: &str, expect_v6: bool) -> Result<IpAddr, DomainError> {
    let ip: IpAddr = host
        .parse()
        .map_err(|_| DomainError::InvalidIpAddress(host.to_string()))?;
    if expect_v6 && ip.is_ipv4() {
        return Err(DomainError::InvalidIpAddress(format!(
            "{} is not an IPv6 bind address",
            host
        )));
    }
    Ok(ip)
}

fn create_udp_socket(addr: SocketAddr, v6_only: bool) -> Result<UdpSocket, DomainError> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| DomainError::Io(e.to_string()))?;

    let configure = || -> std::io::Result<()> {
        if addr.is_ipv6() {
            socket.set_only_v6(v6_only)?;
        }
        socket.set_reuse_address(true)?;
        socket.set_recv_buffer_size(512 * 1024)?;
        socket.set_send_buffer_size(512 * 1024)?;
        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;
        Ok(())
    };
    configure().map_err(|e| DomainError::Io(format!("bind udp {}: {}", addr, e)))?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(|e| DomainError::Io(e.to_string()))
}

fn create_tcp_listener(addr: SocketAddr, v6_only: bool) -> Result<TcpListener, DomainError> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| DomainError::Io(e.to_string()))?;

    let configure = || -> std::io::Result<()> {
        if addr.is_ipv6() {
            socket.set_only_v6(v6_only)?;
        }
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(1024)?;
        socket.set_nonblocking(true)?;
        Ok(())
    };
    configure().map_err(|e| DomainError::Io(format!("bind tcp {}: {}", addr, e)))?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener).map_err(|e| DomainError::Io(e.to_string()))
}

async fn run_udp(socket: Arc<UdpSocket>, pipeline: Arc<QueryPipeline>, shutdown: CancellationToken) {
    let mut buf = [0u8; MAX_UDP_PACKET];
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("UDP listener stopping");
                break;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = match received {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "UDP recv error");
                        continue;
                    }
                };
                let packet = buf[..len].to_vec();
                let pipeline = Arc::clone(&pipeline);
                let socket = Arc::clone(&socket);
                tokio::spawn(async move {
                    if let Some(response) =
                        pipeline.handle_query(&packet, peer.ip(), ListenerTransport::Udp).await
                    {
                        if let Err(e) = socket.send_to(&response, peer).await {
                            debug!(error = %e, peer = %peer, "UDP send failed");
                        }
                    }
                });
            }
        }
    }
}

async fn run_tcp(listener: TcpListener, pipeline: Arc<QueryPipeline>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("TCP listener stopping");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "TCP accept error");
                        continue;
                    }
                };
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    if let Err(e) = serve_tcp_connection(stream, peer.ip(), pipeline).await {
                        debug!(error = %e, peer = %peer, "TCP connection closed");
                    }
                });
            }
        }
    }
}

/// Serve length-prefixed queries on one connection until the peer goes
/// idle for 5 s or closes. Responses go back in arrival order.
async fn serve_tcp_connection(
    mut stream: TcpStream,
    peer_ip: IpAddr,
    pipeline: Arc<QueryPipeline>,
) -> std::io::Result<()> {
    loop {
        let mut len_buf = [0u8; 2];
        match tokio::time::timeout(TCP_IDLE_TIMEOUT, stream.read_exact(&mut len_buf)).await {
            Err(_) => return Ok(()), // idle
            Ok(Err(_)) => return Ok(()), // closed
            Ok(Ok(_)) => {}
        }

        let len = u16::from_be_bytes(len_buf) as usize;
        if len == 0 {
            continue;
        }
        let mut packet = vec![0u8; len];
        stream.read_exact(&mut packet).await?;

        if let Some(response) =
            pipeline.handle_query(&packet, peer_ip, ListenerTransport::Tcp).await
        {
            if response.len() > u16::MAX as usize {
                error!(len = response.len(), "Response too large for TCP framing");
                continue;
            }
            stream.write_all(&(response.len() as u16).to_be_bytes()).await?;
            stream.write_all(&response).await?;
            stream.flush().await?;
        }
    }
}
