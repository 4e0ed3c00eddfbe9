//! # Capture-Point Game Client Library
//!
//! Client-side state synchronization for a networked capture-point game. The
//! server owns the world; this library keeps a locally rendered copy of it
//! consistent with the snapshots the server streams, while the local player
//! stays responsive to input.
//!
//! ## Architecture Overview
//!
//! A transport session runs on tokio tasks and owns the socket. Decoded
//! snapshots cross to the render thread over a bounded channel, and the
//! render loop calls [`game::SyncClient::update`] once per tick to drain them,
//! advance capture state and push local input back out.
//!
//! ### Local Prediction
//! The locally controlled player moves the moment a key is held. Its position
//! is either never overwritten by the server or snapped only when the drift
//! exceeds a correction threshold, depending on configuration.
//!
//! ### Remote Interpolation
//! Every remote player keeps its last two authoritative samples. Rendering
//! eases from the older one to the newer one over a short window, so motion
//! stays smooth between discrete network updates.
//!
//! ### Capture Points
//! Contest progress runs on the local clock. Ownership flips when an attacker
//! has held a point for the capture duration, and resets when they leave.
//!
//! ## Module Organization
//!
//! - `config`: client configuration file and defaults
//! - `error`: connection, send, receive and handshake failures
//! - `transport`: datagram and length-prefixed stream framing
//! - `session`: identity handshake plus the background receive and write loops
//! - `world`: the entity table and the inbound reconciler
//! - `capture`: the capture-point state machine
//! - `interpolation`: render-time easing of remote players
//! - `outbound`: position rate limiting
//! - `input`: the render host contract and input sampling
//! - `game`: the per-tick synchronization core
//! - `level`: switchable levels and the frame view model
//! - `rendering`: macroquad drawing of frames
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::config::ClientConfig;
//! use client::game::SyncClient;
//! use client::input::MacroquadHost;
//! use client::session::Session;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let session = Session::connect(&config).await?;
//! let mut client = SyncClient::new(session, &config);
//!
//! let host = MacroquadHost;
//! client.update(&host);
//! let entities = client.entities_for_render(0);
//! let points = client.capture_points_for_render(0);
//! # let _ = (entities, points);
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod game;
pub mod input;
pub mod interpolation;
pub mod level;
pub mod outbound;
pub mod rendering;
pub mod session;
pub mod transport;
pub mod world;
