//! Locally held world state and the inbound reconciler.
//!
//! The table always contains exactly one locally controlled entity, held
//! apart from the remote map so it cannot be pruned or duplicated. Remote
//! entities are created the first time a snapshot mentions them and are
//! double-buffered on every later mention so the interpolator has a previous
//! sample to blend from.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use shared::{PlayerId, PlayerState, Pose, Snapshot};

use crate::capture::CaptureBoard;
use crate::config::LocalAuthority;

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: PlayerId,
    pub current: Pose,
    pub previous: Pose,
    pub last_update_ms: u64,
    pub flip_x: bool,
    pub name: String,
    pub skin: String,
}

impl Entity {
    pub fn new(id: PlayerId, pose: Pose, now_ms: u64) -> Self {
        Self {
            id,
            current: pose,
            previous: pose,
            last_update_ms: now_ms,
            flip_x: false,
            name: String::new(),
            skin: String::new(),
        }
    }

    fn from_state(state: &PlayerState, now_ms: u64) -> Self {
        let mut entity = Self::new(state.id, state.pose(), now_ms);
        entity.copy_metadata(state);
        entity
    }

    /// Shifts the current sample into `previous` and adopts the new one.
    fn absorb(&mut self, state: &PlayerState, now_ms: u64) {
        self.previous = self.current;
        self.current = state.pose();
        self.last_update_ms = now_ms;
        self.copy_metadata(state);
    }

    fn copy_metadata(&mut self, state: &PlayerState) {
        self.flip_x = state.flip_x;
        self.name.clone_from(&state.name);
        self.skin.clone_from(&state.skin);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scores {
    pub team1: i64,
    pub team2: i64,
}

pub struct World {
    local: Entity,
    authority: LocalAuthority,
    remotes: BTreeMap<PlayerId, Entity>,
    captures: CaptureBoard,
    scores: Scores,
}

impl World {
    pub fn new(
        local_id: PlayerId,
        spawn: Pose,
        name: &str,
        skin: &str,
        authority: LocalAuthority,
        capture_duration_ms: u64,
    ) -> Self {
        let mut local = Entity::new(local_id, spawn, 0);
        local.name = name.to_string();
        local.skin = skin.to_string();

        Self {
            local,
            authority,
            remotes: BTreeMap::new(),
            captures: CaptureBoard::new(capture_duration_ms),
            scores: Scores::default(),
        }
    }

    pub fn local_id(&self) -> PlayerId {
        self.local.id
    }

    pub fn local(&self) -> &Entity {
        &self.local
    }

    pub fn entity(&self, id: PlayerId) -> Option<&Entity> {
        if id == self.local.id {
            Some(&self.local)
        } else {
            self.remotes.get(&id)
        }
    }

    /// The local entity first, then remotes in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        std::iter::once(&self.local).chain(self.remotes.values())
    }

    pub fn remote_entities(&self) -> impl Iterator<Item = &Entity> {
        self.remotes.values()
    }

    pub fn captures(&self) -> &CaptureBoard {
        &self.captures
    }

    pub fn captures_mut(&mut self) -> &mut CaptureBoard {
        &mut self.captures
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    /// Moves the locally predicted entity. It is never interpolated, so both
    /// samples are set.
    pub fn move_local(&mut self, pose: Pose, flip_x: bool) {
        self.local.previous = pose;
        self.local.current = pose;
        self.local.flip_x = flip_x;
    }

    /// Merges one authoritative snapshot. Ids repeated within the snapshot
    /// are only honored the first time.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, now_ms: u64) {
        let mut seen = BTreeSet::new();

        for state in &snapshot.players {
            if !seen.insert(state.id) {
                debug!("Duplicate entry for player {} in snapshot", state.id);
                continue;
            }

            if state.id == self.local.id {
                self.reconcile_local(state, now_ms);
                continue;
            }

            match self.remotes.get_mut(&state.id) {
                Some(entity) => entity.absorb(state, now_ms),
                None => {
                    debug!("New remote player {} ({:?})", state.id, state.name);
                    self.remotes
                        .insert(state.id, Entity::from_state(state, now_ms));
                }
            }
        }

        if let Some(points) = &snapshot.capture_points {
            self.captures.merge(points, now_ms);
        }
        if let Some(points) = snapshot.points1 {
            self.scores.team1 = points;
        }
        if let Some(points) = snapshot.points2 {
            self.scores.team2 = points;
        }
    }

    fn reconcile_local(&mut self, state: &PlayerState, now_ms: u64) {
        let local = &mut self.local;
        local.last_update_ms = now_ms;

        if let LocalAuthority::ServerReconciled { threshold } = self.authority {
            let server = state.pose();
            let drift = local.current.distance(&server);
            if drift > threshold {
                debug!(
                    "Correcting local player by {:.2} units to ({:.1}, {:.1})",
                    drift, server.x, server.y
                );
                local.previous = server;
                local.current = server;
            }
        }
    }

    /// Removes remote entities not refreshed within `max_age_ms`. Returns how
    /// many were removed.
    pub fn prune_stale(&mut self, now_ms: u64, max_age_ms: u64) -> usize {
        let before = self.remotes.len();
        self.remotes
            .retain(|_, entity| now_ms.saturating_sub(entity.last_update_ms) <= max_age_ms);
        before - self.remotes.len()
    }
}
