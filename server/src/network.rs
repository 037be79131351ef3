//! TCP transport: accept loop and per-connection read loop
//!
//! The network layer owns the listening socket and feeds raw byte buffers
//! through the codec into the dispatcher, writing the encoded replies back
//! on the same connection. Each accepted connection gets its own tokio task;
//! the registry is the only state shared between them, behind a single
//! read-write lock.
//!
//! Framing: each connection is read in fixed 1024-byte reads and every
//! successful read is interpreted as exactly one packet. A packet split
//! across reads, or several packets arriving in one read, is not supported.

use crate::dispatcher::dispatch;
use crate::registry::Registry;
use log::{debug, error, info, warn};
use shared::READ_BUFFER_SIZE;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

/// The lobby server: a listening socket plus the shared session registry.
pub struct LobbyServer {
    listener: TcpListener,
    registry: Arc<RwLock<Registry>>,
}

impl LobbyServer {
    /// Binds the listening socket. The registry starts empty with its id
    /// counter at the seed value.
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Lobby server listening on {}", listener.local_addr()?);
        Ok(LobbyServer {
            listener,
            registry: Arc::new(RwLock::new(Registry::new())),
        })
    }

    /// The address the server actually bound, useful with port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the shared registry.
    pub fn registry(&self) -> Arc<RwLock<Registry>> {
        Arc::clone(&self.registry)
    }

    /// Accepts connections forever, spawning one task per client.
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Connection accepted from {}", addr);
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        handle_connection(stream, addr, registry).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Per-connection read loop. A read or write failure disconnects this client
/// only; the user entry created at login stays in the registry.
async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<RwLock<Registry>>,
) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        let read = match stream.read(&mut buffer).await {
            Ok(0) => {
                info!("Client {} disconnected", addr);
                return;
            }
            Ok(read) => read,
            Err(e) => {
                info!("Client {} disconnected: {}", addr, e);
                return;
            }
        };

        debug!(
            "Received {} bytes from {}: {}",
            read,
            addr,
            to_hex(&buffer[..read])
        );

        let packet = match shared::decode(&buffer[..read]) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping malformed packet from {}: {}", addr, e);
                continue;
            }
        };
        debug!("Action code {} from {}", packet.code, addr);

        let replies = {
            let mut registry = registry.write().await;
            dispatch(&packet, addr, &mut registry)
        };

        for reply in replies {
            if let Err(e) = stream.write_all(&shared::encode(&reply)).await {
                error!("Failed to write reply to {}: {}", addr, e);
                return;
            }
        }
    }
}

/// Lowercase hex rendering of a byte buffer for debug logs.
fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex_formatting() {
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_hex(&[0x00, 0x0f, 0xff]), "000fff");
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = LobbyServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.registry().read().await.user_count(), 0);
    }
}
