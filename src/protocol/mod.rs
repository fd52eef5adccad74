//! Protocol definitions for the core ⇄ rendering-surface link
//!
//! Messages are MessagePack-encoded and carried in length-prefixed frames.

mod message;

pub use message::{
    ClientMessage, ProjectInfo, RenderConfig, ServerMessage, SessionStatus, SlotId, TabId,
};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum frame payload size (4 MB); anything larger indicates a corrupt
/// or hostile peer
pub const MAX_MESSAGE_SIZE: u32 = 4 * 1024 * 1024;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u32, max: u32 },
}

/// Serialize a message to MessagePack bytes
pub fn serialize<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(msg)?)
}

/// Deserialize a message from MessagePack bytes
pub fn deserialize<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(|e| {
        anyhow!(ProtocolError::MalformedMessage(format!(
            "Failed to deserialize: {}",
            e
        )))
    })
}

/// Frame a payload with a length prefix for streaming
///
/// Frame format: [4-byte length BE][payload]
pub fn frame_message(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u32;
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Unframe one payload from a byte buffer
///
/// Returns (payload, remaining_bytes) on success, or None if not enough data
pub fn unframe_message(buffer: &[u8]) -> Result<Option<(Vec<u8>, &[u8])>> {
    // Need at least 4 bytes for the length prefix
    if buffer.len() < 4 {
        return Ok(None);
    }

    let length_bytes: [u8; 4] = buffer[0..4]
        .try_into()
        .map_err(|_| anyhow!(ProtocolError::InvalidFrame("Invalid length prefix".into())))?;
    let message_length = u32::from_be_bytes(length_bytes);

    if message_length > MAX_MESSAGE_SIZE {
        bail!(ProtocolError::FrameTooLarge {
            size: message_length,
            max: MAX_MESSAGE_SIZE
        });
    }

    let total_length = 4 + message_length as usize;
    if buffer.len() < total_length {
        return Ok(None);
    }

    let payload = buffer[4..total_length].to_vec();
    let remaining = &buffer[total_length..];

    Ok(Some((payload, remaining)))
}

/// Serialize and frame a message in one operation
pub fn serialize_and_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let payload = serialize(msg)?;
    Ok(frame_message(&payload))
}
