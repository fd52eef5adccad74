//! Unix socket listener for rendering-surface connections

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{ClientMessage, PROTOCOL_VERSION};

use super::connection::{client_writer_task, parse_client_message, read_message};
use super::Messenger;

/// Accepts surface connections and feeds their messages into the
/// orchestrator loop
pub struct SurfaceListener {
    socket_path: PathBuf,
}

impl SurfaceListener {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, clearing a stale file left by a dead server
    pub async fn bind(&self) -> Result<UnixListener> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if self.socket_path.exists() {
            // Probe before unlinking: a live server answers the connect.
            match UnixStream::connect(&self.socket_path).await {
                Ok(_) => {
                    return Err(anyhow!(
                        "Another server is already listening on {:?}",
                        self.socket_path
                    ));
                }
                Err(_) => {
                    tracing::info!("Removing stale socket: {:?}", self.socket_path);
                    std::fs::remove_file(&self.socket_path)?;
                }
            }
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(
            "Listening on {:?} (protocol v{})",
            self.socket_path,
            PROTOCOL_VERSION
        );
        Ok(listener)
    }

    /// Remove the socket file on shutdown
    pub fn cleanup(&self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                tracing::error!("Failed to remove socket file: {}", e);
            }
        }
    }
}

/// Accept connections forever, spawning reader/writer tasks per surface
pub async fn accept_loop(
    listener: UnixListener,
    inbound: mpsc::Sender<ClientMessage>,
    messenger: Messenger,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let client_id = Uuid::new_v4();
                tracing::info!("Surface connected: {}", client_id);
                spawn_client_tasks(client_id, stream, inbound.clone(), &messenger);
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}

fn spawn_client_tasks(
    client_id: Uuid,
    stream: UnixStream,
    inbound: mpsc::Sender<ClientMessage>,
    messenger: &Messenger,
) {
    let (mut reader, writer) = stream.into_split();

    tokio::spawn(client_writer_task(client_id, writer, messenger.subscribe()));

    tokio::spawn(async move {
        loop {
            match read_message(&mut reader).await {
                Ok(Some(bytes)) => match parse_client_message(&bytes) {
                    Ok(msg) => {
                        if inbound.send(msg).await.is_err() {
                            break;
                        }
                    }
                    // A malformed message poisons nothing; skip the frame
                    // and keep the connection.
                    Err(e) => {
                        tracing::warn!("Surface {} sent malformed message: {}", client_id, e);
                    }
                },
                Ok(None) => {
                    tracing::info!("Surface disconnected: {}", client_id);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Error reading from surface {}: {}", client_id, e);
                    break;
                }
            }
        }
    });
}
