//! Client configuration.
//!
//! Loaded from an optional JSON file; every field has a default so a partial
//! file (or none at all) is valid. Command line flags are applied on top in
//! the binary.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::{
    CAPTURE_DURATION_MS, CORRECTION_THRESHOLD, INTERPOLATION_WINDOW_MS, MIN_SEND_INTERVAL_MS,
    PLAYER_SPEED,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// One JSON document per UDP datagram.
    #[default]
    Datagram,
    /// Length-prefixed JSON frames over TCP.
    Stream,
}

/// How snapshots may touch the locally controlled entity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LocalAuthority {
    /// The predicted position is never overwritten by the server.
    #[default]
    ClientAuthoritative,
    /// Snap to the server position once drift exceeds `threshold` world units.
    ServerReconciled { threshold: f32 },
}

impl LocalAuthority {
    pub fn reconciled() -> Self {
        LocalAuthority::ServerReconciled {
            threshold: CORRECTION_THRESHOLD,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_addr: String,
    /// Local address to bind before connecting; `None` lets the OS choose.
    pub bind_addr: Option<String>,
    pub transport: TransportKind,
    pub player_name: String,
    pub player_skin: String,
    pub handshake_timeout_ms: u64,
    pub min_send_interval_ms: u64,
    pub interpolation_window_ms: u64,
    pub capture_duration_ms: u64,
    /// World units moved per input tick while a movement key is held.
    pub player_speed: f32,
    pub local_authority: LocalAuthority,
    /// Drop remote entities not refreshed for this long. `None` keeps them.
    pub stale_entity_timeout_ms: Option<u64>,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub outbound_queue: usize,
    pub inbound_queue: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "localhost:8080".to_string(),
            bind_addr: None,
            transport: TransportKind::default(),
            player_name: "Player".to_string(),
            player_skin: "01Knight".to_string(),
            handshake_timeout_ms: 3000,
            min_send_interval_ms: MIN_SEND_INTERVAL_MS,
            interpolation_window_ms: INTERPOLATION_WINDOW_MS,
            capture_duration_ms: CAPTURE_DURATION_MS,
            player_speed: PLAYER_SPEED,
            local_authority: LocalAuthority::default(),
            stale_entity_timeout_ms: None,
            spawn_x: 0.0,
            spawn_y: 0.0,
            outbound_queue: 64,
            inbound_queue: 256,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_yields_defaults() {
        let cfg = ClientConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, ClientConfig::default());
        assert_eq!(cfg.transport, TransportKind::Datagram);
        assert_eq!(cfg.local_authority, LocalAuthority::ClientAuthoritative);
    }

    #[test]
    fn test_partial_json_overrides() {
        let cfg = ClientConfig::from_json_str(
            r#"{
                "server_addr": "10.0.0.5:9000",
                "transport": "stream",
                "local_authority": {"mode": "server_reconciled", "threshold": 12.5},
                "stale_entity_timeout_ms": 2000
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.server_addr, "10.0.0.5:9000");
        assert_eq!(cfg.transport, TransportKind::Stream);
        assert_eq!(
            cfg.local_authority,
            LocalAuthority::ServerReconciled { threshold: 12.5 }
        );
        assert_eq!(cfg.stale_entity_timeout_ms, Some(2000));
        assert_eq!(cfg.interpolation_window_ms, INTERPOLATION_WINDOW_MS);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            ClientConfig::from_json_str(r#"{"transport": "carrier-pigeon"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = ClientConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
