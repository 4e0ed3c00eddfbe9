//! JSON wire codec.
//!
//! Every message is a single JSON object with named fields. Inbound bytes are
//! decoded against the known message schemas; anything else is rejected with a
//! [`DecodeError`] instead of being coerced into an empty structure.

use serde_json::error::Category;
use thiserror::Error;

use crate::{ClientMessage, ServerMessage};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("message matches no known shape: {0}")]
    UnknownShape(#[source] serde_json::Error),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Data => DecodeError::UnknownShape(err),
            Category::Io | Category::Syntax | Category::Eof => DecodeError::Malformed(err),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to encode message: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

pub fn encode_client(msg: &ClientMessage) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(msg)?)
}

pub fn decode_server(bytes: &[u8]) -> Result<ServerMessage, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Server-side counterpart, used by tools and tests that stand in for a server.
pub fn encode_server(msg: &ServerMessage) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(msg)?)
}

pub fn decode_client(bytes: &[u8]) -> Result<ClientMessage, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}
