use serde::{Deserialize, Serialize};

pub mod codec;

pub const PLAYER_SPEED: f32 = 10.0;
pub const MIN_SEND_INTERVAL_MS: u64 = 10;
pub const INTERPOLATION_WINDOW_MS: u64 = 200;
pub const CAPTURE_DURATION_MS: u64 = 5000;
pub const CORRECTION_THRESHOLD: f32 = 15.0;
pub const MIN_CAPTURE_RADIUS: f32 = 10.0;
pub const BASE_WIDTH: f32 = 1600.0;
pub const BASE_HEIGHT: f32 = 900.0;

/// Server-assigned player identity. Zero is the wire sentinel for "nobody".
pub type PlayerId = u32;
pub const NO_PLAYER: PlayerId = 0;

/// A position in unscaled world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
}

impl Pose {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Pose) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityRequestKind {
    #[serde(rename = "get_player_id")]
    GetPlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityRequest {
    pub request: IdentityRequestKind,
    pub name: String,
    pub skin: String,
}

impl IdentityRequest {
    pub fn new(name: impl Into<String>, skin: impl Into<String>) -> Self {
        Self {
            request: IdentityRequestKind::GetPlayerId,
            name: name.into(),
            skin: skin.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PositionUpdate {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub flip_x: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Pull,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionMessage {
    pub id: PlayerId,
    pub action: Action,
}

/// Everything the client puts on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Identity(IdentityRequest),
    Action(ActionMessage),
    Position(PositionUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityResponse {
    pub id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub skin: String,
}

impl PlayerState {
    pub fn new(id: PlayerId, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            flip_x: false,
            name: String::new(),
            skin: String::new(),
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y)
    }
}

/// Server-side contest start stamp. Servers disagree on the representation,
/// so it is carried opaquely and never drives local progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnterTime {
    Millis(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePointState {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    #[serde(default)]
    pub is_captured: bool,
    #[serde(default)]
    pub capturing_player: PlayerId,
    #[serde(default)]
    pub current_capturing_player: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enter_time: Option<EnterTime>,
}

impl CapturePointState {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            x,
            y,
            radius,
            is_captured: false,
            capturing_player: NO_PLAYER,
            current_capturing_player: NO_PLAYER,
            enter_time: None,
        }
    }

    /// The owner as reported by the server, if the point is captured.
    pub fn owner(&self) -> Option<PlayerId> {
        (self.is_captured && self.capturing_player != NO_PLAYER).then_some(self.capturing_player)
    }

    /// The player the server reports inside the radius, if any.
    pub fn attacker(&self) -> Option<PlayerId> {
        (self.current_capturing_player != NO_PLAYER).then_some(self.current_capturing_player)
    }
}

/// Full world state pushed by the server.
///
/// Fields other than `players` are optional so that partial snapshots leave
/// the corresponding local state untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: Vec<PlayerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_points: Option<Vec<CapturePointState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points1: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points2: Option<i64>,
}

/// Everything the server puts on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Snapshot(Snapshot),
    Identity(IdentityResponse),
}
