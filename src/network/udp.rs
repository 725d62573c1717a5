//! UDP socket creation
//!
//! One socket per endpoint. socket2 handles construction so the receive
//! buffer can be enlarged before the socket goes nonblocking; voice
//! datagrams arrive in bursts when the scheduler hiccups.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::NetworkError;

/// Receive buffer request; best effort, the OS may clamp it
const RECV_BUFFER_BYTES: usize = 1 << 20;

/// Bind a tokio UDP socket on `addr` (port 0 picks a free port)
pub fn bind_udp(addr: SocketAddr) -> Result<UdpSocket, NetworkError> {
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;

    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_BYTES) {
        tracing::debug!("could not grow receive buffer: {}", e);
    }

    socket
        .set_nonblocking(true)
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    socket
        .bind(&addr.into())
        .map_err(|e| NetworkError::BindFailed(format!("{}: {}", addr, e)))?;

    UdpSocket::from_std(socket.into()).map_err(|e| NetworkError::BindFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let socket = bind_udp("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = socket.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_reported() {
        let first = bind_udp("127.0.0.1:0".parse().unwrap()).unwrap();
        let taken = first.local_addr().unwrap();
        assert!(matches!(bind_udp(taken), Err(NetworkError::BindFailed(_))));
    }
}
