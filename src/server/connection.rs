//! Rendering-surface connection handling and the typed send boundary

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::protocol::{
    deserialize, frame_message, serialize, ClientMessage, ProjectInfo, RenderConfig, ServerMessage,
    SessionStatus, SlotId, TabId, MAX_MESSAGE_SIZE,
};

/// Typed send boundary for outbound protocol events
///
/// One method per outbound message and no business logic; the rest of the
/// core cannot construct a malformed event. Sends are broadcast to every
/// connected surface; having no connected surface is not an error.
#[derive(Clone)]
pub struct Messenger {
    tx: broadcast::Sender<ServerMessage>,
}

impl Messenger {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe a surface connection (or a test) to the outbound stream
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    fn send(&self, msg: ServerMessage) {
        // Err means no receivers; the surface may simply not be attached.
        let _ = self.tx.send(msg);
    }

    pub fn projects(&self, projects: Vec<ProjectInfo>) {
        self.send(ServerMessage::Projects { projects });
    }

    pub fn terminal_config(&self, config: RenderConfig) {
        self.send(ServerMessage::TerminalConfig { config });
    }

    pub fn output(&self, tab_id: TabId, terminal_id: SlotId, data: String) {
        self.send(ServerMessage::Output {
            tab_id,
            terminal_id,
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
    }

    pub fn clear(&self, tab_id: TabId, terminal_id: SlotId) {
        self.send(ServerMessage::Clear {
            tab_id,
            terminal_id,
        });
    }

    pub fn error(&self, tab_id: TabId, terminal_id: SlotId, message: String) {
        self.send(ServerMessage::Error {
            tab_id,
            terminal_id,
            message,
        });
    }

    pub fn killed(&self, tab_id: TabId, terminal_id: SlotId) {
        self.send(ServerMessage::Killed {
            tab_id,
            terminal_id,
        });
    }

    pub fn restarting(&self, tab_id: TabId, terminal_id: SlotId) {
        self.send(ServerMessage::Restarting {
            tab_id,
            terminal_id,
        });
    }

    pub fn status(&self, tab_id: TabId, terminal_id: SlotId, status: SessionStatus) {
        self.send(ServerMessage::Status {
            tab_id,
            terminal_id,
            status,
        });
    }

    pub fn drop_resolved(&self, tab_id: TabId, terminal_id: SlotId, paths: Vec<String>) {
        self.send(ServerMessage::DropResolved {
            tab_id,
            terminal_id,
            paths,
        });
    }

    pub fn refresh(&self) {
        self.send(ServerMessage::Refresh);
    }

    pub fn tab_created(&self, tab_id: TabId) {
        self.send(ServerMessage::TabCreated { tab_id });
    }

    pub fn tab_closed(&self, tab_id: TabId, new_active_tab_id: TabId) {
        self.send(ServerMessage::TabClosed {
            tab_id,
            new_active_tab_id,
        });
    }

    pub fn tab_switched(&self, tab_id: TabId) {
        self.send(ServerMessage::TabSwitched { tab_id });
    }
}

/// Read a length-prefixed message from a stream
///
/// Returns `None` on a clean end of stream.
pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];

    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_MESSAGE_SIZE {
        anyhow::bail!("Frame too large: {} bytes", len);
    }

    let mut buffer = vec![0u8; len as usize];
    reader.read_exact(&mut buffer).await?;

    Ok(Some(buffer))
}

/// Write a length-prefixed message to a stream
pub async fn write_message<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let framed = frame_message(payload);
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

/// Parse an inbound surface message from bytes
pub fn parse_client_message(bytes: &[u8]) -> Result<ClientMessage> {
    deserialize(bytes)
}

/// Drain the outbound broadcast into one surface connection
///
/// Runs until the connection breaks or the messenger is dropped. A lagged
/// receiver skips to the live edge; the surface resynchronizes from
/// subsequent events.
pub async fn client_writer_task(
    client_id: Uuid,
    mut writer: OwnedWriteHalf,
    mut outbound: broadcast::Receiver<ServerMessage>,
) {
    loop {
        let msg = match outbound.recv().await {
            Ok(msg) => msg,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Surface {} lagged, skipped {} events", client_id, skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match serialize(&msg) {
            Ok(payload) => {
                if let Err(e) = write_message(&mut writer, &payload).await {
                    tracing::debug!("Surface {} write failed: {}", client_id, e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize outbound message: {}", e);
            }
        }
    }

    tracing::debug!("Writer task for surface {} finished", client_id);
}
