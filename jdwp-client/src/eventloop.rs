// JDWP Event Loop
//
// Owns the socket: writes command packets, routes replies back to their
// waiting callers by packet id and forwards composite event packets.

use crate::events::{parse_event_packet, EventSet};
use crate::protocol::{CommandPacket, JdwpError, JdwpResult, ReplyPacket, HEADER_SIZE, REPLY_FLAG};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

/// Maximum allowed JDWP packet size (64MB)
///
/// Instance listings of large heaps are the biggest replies we expect.
const MAX_PACKET_SIZE: usize = 64 * 1024 * 1024;

type ReplySender = oneshot::Sender<JdwpResult<ReplyPacket>>;

/// Request to send a command and get reply
pub struct CommandRequest {
    pub packet: CommandPacket,
    pub reply_tx: ReplySender,
}

/// Handle to the event loop for sending commands and receiving events
#[derive(Clone, Debug)]
pub struct EventLoopHandle {
    command_tx: mpsc::Sender<CommandRequest>,
    event_rx: Arc<Mutex<mpsc::Receiver<EventSet>>>,
}

impl EventLoopHandle {
    /// Send a command and wait for its reply
    pub async fn send_command(&self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(CommandRequest { packet, reply_tx })
            .await
            .map_err(|_| JdwpError::ConnectionClosed)?;

        reply_rx.await.map_err(|_| JdwpError::ConnectionClosed)?
    }

    /// Wait for the next event set; `None` once the connection is gone
    pub async fn recv_event(&self) -> Option<EventSet> {
        let mut rx = self.event_rx.lock().await;
        rx.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

/// Start the event loop task over any split duplex stream
pub fn spawn_event_loop<R, W>(reader: R, writer: W) -> EventLoopHandle
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(32);
    // Suspend/resume bookkeeping depends on every event arriving
    let (event_tx, event_rx) = mpsc::channel(1024);

    tokio::spawn(event_loop_task(reader, writer, command_rx, event_tx));

    EventLoopHandle {
        command_tx,
        event_rx: Arc::new(Mutex::new(event_rx)),
    }
}

async fn event_loop_task<R, W>(
    mut reader: R,
    mut writer: W,
    mut command_rx: mpsc::Receiver<CommandRequest>,
    event_tx: mpsc::Sender<EventSet>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Event loop started");

    let mut pending_replies: HashMap<u32, ReplySender> = HashMap::new();

    loop {
        tokio::select! {
            Some(cmd) = command_rx.recv() => {
                let packet_id = cmd.packet.id;
                debug!("Sending command id={} set={} cmd={}", packet_id, cmd.packet.command_set, cmd.packet.command);

                let encoded = cmd.packet.encode();
                let written = match writer.write_all(&encoded).await {
                    Ok(()) => writer.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    error!("Failed to write command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }

                pending_replies.insert(packet_id, cmd.reply_tx);
            }

            result = read_packet(&mut reader) => {
                match result {
                    Ok((true, packet_id, data)) => {
                        debug!("Received reply id={}", packet_id);
                        match pending_replies.remove(&packet_id) {
                            Some(tx) => {
                                tx.send(ReplyPacket::decode(&data)).ok();
                            }
                            None => warn!("Received reply for unknown command id={}", packet_id),
                        }
                    }
                    Ok((false, _, data)) => {
                        match parse_event_packet(&data[HEADER_SIZE..]) {
                            Ok(event_set) => {
                                debug!("Parsed event set: {} events, suspend_policy={}",
                                       event_set.events.len(), event_set.suspend_policy);
                                if event_tx.send(event_set).await.is_err() {
                                    warn!("Event receiver dropped, future events will be discarded");
                                }
                            }
                            Err(e) => warn!("Failed to parse event: {}", e),
                        }
                    }
                    Err(e) => {
                        info!("Connection ended: {}", e);
                        break;
                    }
                }
            }
        }
    }

    for (_, tx) in pending_replies.drain() {
        tx.send(Err(JdwpError::ConnectionClosed)).ok();
    }
    info!("Event loop shutting down");
}

/// Read one packet; returns (is_reply, id, full packet bytes)
async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> JdwpResult<(bool, u32, Vec<u8>)> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let packet_id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let flags = header[8];

    if length < HEADER_SIZE {
        return Err(JdwpError::Protocol(format!("Invalid packet length: {}", length)));
    }

    if length > MAX_PACKET_SIZE {
        return Err(JdwpError::Protocol(format!(
            "Packet too large: {} bytes (max: {} bytes)",
            length, MAX_PACKET_SIZE
        )));
    }

    let mut full_packet = header.to_vec();
    full_packet.resize(length, 0);
    reader.read_exact(&mut full_packet[HEADER_SIZE..]).await?;

    Ok((flags == REPLY_FLAG, packet_id, full_packet))
}
