//! Render host contract and local input sampling.

use macroquad::prelude::{is_key_down, KeyCode};
use shared::{Action, Pose};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Logical keys the core reads. The host decides the physical binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Pull,
    Push,
    Confirm,
    MenuUp,
    MenuDown,
}

/// What the core consumes from the window/render loop that drives it.
pub trait RenderHost {
    fn current_time_millis(&self) -> u64;
    fn is_key_down(&self, key: Key) -> bool;
}

/// Movement keys held during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovementInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementInput {
    pub fn sample(host: &dyn RenderHost) -> Self {
        Self {
            up: host.is_key_down(Key::Up),
            down: host.is_key_down(Key::Down),
            left: host.is_key_down(Key::Left),
            right: host.is_key_down(Key::Right),
        }
    }

    /// Open-loop dead-reckoning: every held key moves `speed` units.
    pub fn apply(&self, pose: Pose, speed: f32) -> Pose {
        let mut dx = 0.0;
        let mut dy = 0.0;
        if self.up {
            dy -= speed;
        }
        if self.down {
            dy += speed;
        }
        if self.left {
            dx -= speed;
        }
        if self.right {
            dx += speed;
        }
        pose.translate(dx, dy)
    }

    /// Sprites flip while moving left and keep their facing when no
    /// horizontal key is held.
    pub fn facing_left(&self, was_left: bool) -> bool {
        if self.left {
            true
        } else if self.right {
            false
        } else {
            was_left
        }
    }
}

/// Turns held action keys into one-shot press events.
#[derive(Debug, Default)]
pub struct ActionEdges {
    prev_pull: bool,
    prev_push: bool,
}

impl ActionEdges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, host: &dyn RenderHost) -> Vec<Action> {
        let pull = host.is_key_down(Key::Pull);
        let push = host.is_key_down(Key::Push);

        let mut pressed = Vec::new();
        if pull && !self.prev_pull {
            pressed.push(Action::Pull);
        }
        if push && !self.prev_push {
            pressed.push(Action::Push);
        }

        self.prev_pull = pull;
        self.prev_push = push;
        pressed
    }
}

/// Fires once per press of a single key.
///
/// Starts out as if the key were already held, so a key still down from the
/// previous level does not trigger immediately.
#[derive(Debug)]
pub struct KeyEdge {
    key: Key,
    held: bool,
}

impl KeyEdge {
    pub fn new(key: Key) -> Self {
        Self { key, held: true }
    }

    pub fn pressed(&mut self, host: &dyn RenderHost) -> bool {
        let down = host.is_key_down(self.key);
        let pressed = down && !self.held;
        self.held = down;
        pressed
    }
}

/// Host backed by the macroquad window. Must only be used from the macroquad
/// main loop.
#[derive(Debug, Default)]
pub struct MacroquadHost;

impl RenderHost for MacroquadHost {
    fn current_time_millis(&self) -> u64 {
        get_timestamp()
    }

    fn is_key_down(&self, key: Key) -> bool {
        match key {
            Key::Up => is_key_down(KeyCode::W),
            Key::Down => is_key_down(KeyCode::S),
            Key::Left => is_key_down(KeyCode::A),
            Key::Right => is_key_down(KeyCode::D),
            Key::Pull => is_key_down(KeyCode::P),
            Key::Push => is_key_down(KeyCode::O),
            Key::Confirm => is_key_down(KeyCode::Enter),
            Key::MenuUp => is_key_down(KeyCode::Up),
            Key::MenuDown => is_key_down(KeyCode::Down),
        }
    }
}

pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
