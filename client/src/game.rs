use log::{debug, warn};
use shared::{ActionMessage, ClientMessage, PlayerId, Pose};

use crate::capture::CapturePointView;
use crate::config::ClientConfig;
use crate::input::{ActionEdges, MovementInput, RenderHost};
use crate::interpolation;
use crate::outbound::OutboundLimiter;
use crate::session::{Session, SessionEvent, SessionLink};
use crate::world::{Scores, World};

/// Per-tick knobs taken from the client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub interpolation_window_ms: u64,
    pub player_speed: f32,
    pub stale_entity_timeout_ms: Option<u64>,
}

impl From<&ClientConfig> for SyncSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interpolation_window_ms: config.interpolation_window_ms,
            player_speed: config.player_speed,
            stale_entity_timeout_ms: config.stale_entity_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// The session is gone; the reason is the one reported by the transport.
    Ended(String),
}

/// One entity as the renderer should draw it this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub id: PlayerId,
    pub pose: Pose,
    pub flip_x: bool,
    pub name: String,
    pub skin: String,
    pub is_local: bool,
}

/// The synchronization core as seen by the render loop.
pub struct SyncClient<L: SessionLink = Session> {
    link: L,
    world: World,
    limiter: OutboundLimiter,
    actions: ActionEdges,
    settings: SyncSettings,
    ended: Option<String>,
}

impl<L: SessionLink> SyncClient<L> {
    pub fn new(link: L, config: &ClientConfig) -> Self {
        let id = link.player_id();
        let spawn = Pose::new(config.spawn_x, config.spawn_y);
        Self {
            world: World::new(
                id,
                spawn,
                &config.player_name,
                &config.player_skin,
                config.local_authority,
                config.capture_duration_ms,
            ),
            limiter: OutboundLimiter::new(id, config.min_send_interval_ms, spawn),
            actions: ActionEdges::new(),
            settings: SyncSettings::from(config),
            ended: None,
            link,
        }
    }

    pub fn local_id(&self) -> PlayerId {
        self.world.local_id()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn scores(&self) -> Scores {
        self.world.scores()
    }

    /// Runs one tick: drains inbound events, advances capture state and
    /// pushes local input out through the rate limiter.
    pub fn update(&mut self, host: &dyn RenderHost) -> TickOutcome {
        if let Some(reason) = &self.ended {
            return TickOutcome::Ended(reason.clone());
        }

        let now = host.current_time_millis();
        self.drain_events(now);
        self.world.captures_mut().advance(now);

        if let Some(max_age) = self.settings.stale_entity_timeout_ms {
            let removed = self.world.prune_stale(now, max_age);
            if removed > 0 {
                debug!("Dropped {} stale remote players", removed);
            }
        }

        match &self.ended {
            Some(reason) => TickOutcome::Ended(reason.clone()),
            None => {
                self.step_input(host, now);
                TickOutcome::Running
            }
        }
    }

    fn drain_events(&mut self, now: u64) {
        while let Some(event) = self.link.poll_event() {
            match event {
                SessionEvent::Snapshot(snapshot) => self.world.apply_snapshot(&snapshot, now),
                SessionEvent::Closed(reason) => {
                    warn!("Session closed: {}", reason);
                    self.ended = Some(reason);
                    return;
                }
            }
        }
    }

    fn step_input(&mut self, host: &dyn RenderHost, now: u64) {
        let input = MovementInput::sample(host);
        let local = self.world.local();
        let pose = input.apply(local.current, self.settings.player_speed);
        let flip_x = input.facing_left(local.flip_x);
        self.world.move_local(pose, flip_x);

        if let Some(update) = self.limiter.maybe_send(pose, flip_x, now) {
            if let Err(e) = self.link.send(&ClientMessage::Position(update)) {
                warn!("Failed to send position update: {}", e);
            }
        }

        for action in self.actions.update(host) {
            let msg = ClientMessage::Action(ActionMessage {
                id: self.world.local_id(),
                action,
            });
            if let Err(e) = self.link.send(&msg) {
                warn!("Failed to send {:?} action: {}", action, e);
            }
        }
    }

    /// The local entity first at its predicted pose, then remotes
    /// interpolated for `render_time_ms`.
    pub fn entities_for_render(&self, render_time_ms: u64) -> Vec<EntityView> {
        let local_id = self.world.local_id();
        self.world
            .entities()
            .map(|entity| {
                let is_local = entity.id == local_id;
                let pose = if is_local {
                    entity.current
                } else {
                    interpolation::pose(
                        entity,
                        render_time_ms,
                        self.settings.interpolation_window_ms,
                    )
                };
                EntityView {
                    id: entity.id,
                    pose,
                    flip_x: entity.flip_x,
                    name: entity.name.clone(),
                    skin: entity.skin.clone(),
                    is_local,
                }
            })
            .collect()
    }

    pub fn capture_points_for_render(&self, render_time_ms: u64) -> Vec<CapturePointView> {
        self.world.captures().views(render_time_ms)
    }

    pub fn shutdown(&mut self) {
        self.link.shutdown();
    }
}
