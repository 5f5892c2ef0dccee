// JDWP connection management
//
// Handles TCP connection, handshake, and event loop startup

use crate::eventloop::{spawn_event_loop, EventLoopHandle};
use crate::events::EventSet;
use crate::protocol::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Shared handle to one JDWP connection
///
/// Cloning is cheap; all clones talk through the same event loop and share
/// the packet id counter.
#[derive(Debug, Clone)]
pub struct JdwpConnection {
    event_loop: EventLoopHandle,
    next_id: Arc<AtomicU32>,
}

impl JdwpConnection {
    /// Connect to a JVM via JDWP
    pub async fn connect(host: &str, port: u16) -> JdwpResult<Self> {
        info!("Connecting to JDWP at {}:{}", host, port);

        let mut stream = TcpStream::connect((host, port)).await?;
        Self::handshake(&mut stream).await?;

        let (reader, writer) = stream.into_split();
        Ok(Self::start(reader, writer))
    }

    /// Start the event loop over an already handshaken stream
    pub fn start<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            event_loop: spawn_event_loop(reader, writer),
            next_id: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Perform the JDWP handshake
    pub async fn handshake<S>(stream: &mut S) -> JdwpResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        debug!("Performing JDWP handshake");

        stream.write_all(JDWP_HANDSHAKE).await?;
        stream.flush().await?;

        let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
        stream.read_exact(&mut buf).await?;

        if buf != JDWP_HANDSHAKE {
            warn!("Invalid handshake response: {:?}", buf);
            return Err(JdwpError::InvalidHandshake);
        }

        info!("JDWP handshake successful");
        Ok(())
    }

    /// Send a command and wait for reply
    pub async fn send_command(&self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        debug!("Sending command packet id={}", packet.id);
        self.event_loop.send_command(packet).await
    }

    /// Build, send and error-check one command; returns the reply payload
    pub async fn request<F>(&self, command_set: u8, command: u8, build: F) -> JdwpResult<Vec<u8>>
    where
        F: FnOnce(&mut CommandPacket),
    {
        let mut packet = CommandPacket::new(self.next_id(), command_set, command);
        build(&mut packet);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;
        Ok(reply.data)
    }

    /// Wait for the next event set; `None` once the VM disconnected
    pub async fn recv_event(&self) -> Option<EventSet> {
        self.event_loop.recv_event().await
    }

    pub fn is_closed(&self) -> bool {
        self.event_loop.is_closed()
    }

    /// Generate next packet ID
    pub fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handshake_roundtrip() {
        let (mut client, mut vm) = tokio::io::duplex(64);

        let vm_task = tokio::spawn(async move {
            let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
            vm.read_exact(&mut buf).await.unwrap();
            vm.write_all(&buf).await.unwrap();
            vm
        });

        JdwpConnection::handshake(&mut client).await.unwrap();
        drop(vm_task.await.unwrap());
    }

    #[tokio::test]
    async fn test_handshake_rejects_garbage() {
        let (mut client, mut vm) = tokio::io::duplex(64);

        let vm_task = tokio::spawn(async move {
            let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
            vm.read_exact(&mut buf).await.unwrap();
            vm.write_all(b"NOT-A-HANDSHAKE").await.unwrap();
            vm
        });

        let result = JdwpConnection::handshake(&mut client).await;
        assert!(matches!(result, Err(JdwpError::InvalidHandshake)));
        drop(vm_task.await.unwrap());
    }

    #[tokio::test]
    async fn test_packet_ids_are_shared_between_clones() {
        let (client, _vm) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(client);
        let conn = JdwpConnection::start(reader, writer);
        let clone = conn.clone();

        assert_eq!(conn.next_id(), 1);
        assert_eq!(clone.next_id(), 2);
        assert_eq!(conn.next_id(), 3);
    }
}
