//! Capture-point state machine.
//!
//! Contest progress is driven by the local clock: the attempt start is the
//! render-thread time at which a snapshot first reported the attacker. The
//! server's own `enterTime` is never consulted, so progress cannot jump when
//! the two clocks disagree.

use log::{debug, info};
use shared::{CapturePointState, PlayerId, Pose, MIN_CAPTURE_RADIUS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Neutral,
    Owned(PlayerId),
    Contested {
        attacker: PlayerId,
        defender: Option<PlayerId>,
        started_at_ms: u64,
    },
}

impl CapturePhase {
    fn settled(owner: Option<PlayerId>) -> Self {
        match owner {
            Some(id) => CapturePhase::Owned(id),
            None => CapturePhase::Neutral,
        }
    }
}

/// Whom the renderer should color a point (or its contest ring) after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKey {
    Neutral,
    Player(PlayerId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturePointView {
    pub position: Pose,
    pub radius: f32,
    pub owner: ColorKey,
    pub attacker: Option<ColorKey>,
    pub progress: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturePoint {
    pub position: Pose,
    pub radius: f32,
    phase: CapturePhase,
}

impl CapturePoint {
    pub fn new(position: Pose, radius: f32, phase: CapturePhase) -> Self {
        Self {
            position,
            radius,
            phase,
        }
    }

    /// Seeds a point the first time the server mentions it.
    pub fn from_report(report: &CapturePointState, now_ms: u64) -> Self {
        let owner = report.owner();
        let phase = match report.attacker() {
            Some(attacker) if Some(attacker) != owner => CapturePhase::Contested {
                attacker,
                defender: owner,
                started_at_ms: now_ms,
            },
            _ => CapturePhase::settled(owner),
        };
        Self::new(Pose::new(report.x, report.y), report.radius, phase)
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn owner(&self) -> Option<PlayerId> {
        match self.phase {
            CapturePhase::Neutral => None,
            CapturePhase::Owned(id) => Some(id),
            CapturePhase::Contested { defender, .. } => defender,
        }
    }

    pub fn is_captured(&self) -> bool {
        self.owner().is_some()
    }

    pub fn attacker(&self) -> Option<PlayerId> {
        match self.phase {
            CapturePhase::Contested { attacker, .. } => Some(attacker),
            _ => None,
        }
    }

    pub fn attempt_started_at(&self) -> Option<u64> {
        match self.phase {
            CapturePhase::Contested { started_at_ms, .. } => Some(started_at_ms),
            _ => None,
        }
    }

    pub fn progress(&self, now_ms: u64, duration_ms: u64) -> f32 {
        let CapturePhase::Contested {
            attacker,
            defender,
            started_at_ms,
        } = self.phase
        else {
            return 0.0;
        };
        if defender == Some(attacker) {
            return 0.0;
        }
        if duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(started_at_ms);
        (elapsed as f32 / duration_ms as f32).clamp(0.0, 1.0)
    }

    /// Completes the contest once progress reaches 1. Returns the new owner.
    pub fn advance(&mut self, now_ms: u64, duration_ms: u64) -> Option<PlayerId> {
        let CapturePhase::Contested { attacker, .. } = self.phase else {
            return None;
        };
        if self.progress(now_ms, duration_ms) >= 1.0 {
            self.phase = CapturePhase::Owned(attacker);
            return Some(attacker);
        }
        None
    }

    /// Merges one server report. Returns the new owner if a contest completed.
    pub fn observe(
        &mut self,
        report: &CapturePointState,
        now_ms: u64,
        duration_ms: u64,
    ) -> Option<PlayerId> {
        self.position = Pose::new(report.x, report.y);
        self.radius = report.radius;

        let completed = self.advance(now_ms, duration_ms);
        let reported_owner = report.owner();
        // An owner standing on its own point is not an attacker.
        let reported_attacker = report.attacker().filter(|id| Some(*id) != reported_owner);

        if let CapturePhase::Contested {
            attacker, defender, ..
        } = self.phase
        {
            if reported_owner == Some(attacker) {
                debug!("Server confirmed capture by player {} early", attacker);
                self.phase = CapturePhase::Owned(attacker);
                return Some(attacker);
            }
            match reported_attacker {
                Some(id) if id == attacker => return completed,
                Some(id) if Some(id) != defender => {
                    debug!("Contest switched from player {} to {}", attacker, id);
                    self.phase = CapturePhase::Contested {
                        attacker: id,
                        defender,
                        started_at_ms: now_ms,
                    };
                    return completed;
                }
                _ => {
                    debug!("Player {} disengaged, progress reset", attacker);
                    self.phase = CapturePhase::settled(defender);
                }
            }
        }

        // Ownership only changes through a completed contest, so a settled
        // point ignores the owner the server reports.
        let owner = self.owner();
        if let Some(id) = reported_attacker.filter(|id| Some(*id) != owner) {
            self.phase = CapturePhase::Contested {
                attacker: id,
                defender: owner,
                started_at_ms: now_ms,
            };
        }

        completed
    }

    pub fn view(&self, now_ms: u64, duration_ms: u64) -> CapturePointView {
        CapturePointView {
            position: self.position,
            radius: self.radius.max(MIN_CAPTURE_RADIUS),
            owner: self.owner().map_or(ColorKey::Neutral, ColorKey::Player),
            attacker: self.attacker().map(ColorKey::Player),
            progress: self.progress(now_ms, duration_ms),
        }
    }
}

/// All capture points of the current map, in server order.
#[derive(Debug, Clone)]
pub struct CaptureBoard {
    points: Vec<CapturePoint>,
    duration_ms: u64,
}

impl CaptureBoard {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            points: Vec::new(),
            duration_ms,
        }
    }

    pub fn points(&self) -> &[CapturePoint] {
        &self.points
    }

    /// Applies the capture-point list of a snapshot. Points are matched by
    /// index; the list length is authoritative.
    pub fn merge(&mut self, reports: &[CapturePointState], now_ms: u64) {
        for (index, report) in reports.iter().enumerate() {
            match self.points.get_mut(index) {
                Some(point) => {
                    if let Some(owner) = point.observe(report, now_ms, self.duration_ms) {
                        info!("Capture point {} taken by player {}", index, owner);
                    }
                }
                None => self.points.push(CapturePoint::from_report(report, now_ms)),
            }
        }
        self.points.truncate(reports.len());
    }

    pub fn advance(&mut self, now_ms: u64) {
        for (index, point) in self.points.iter_mut().enumerate() {
            if let Some(owner) = point.advance(now_ms, self.duration_ms) {
                info!("Capture point {} taken by player {}", index, owner);
            }
        }
    }

    pub fn views(&self, now_ms: u64) -> Vec<CapturePointView> {
        self.points
            .iter()
            .map(|point| point.view(now_ms, self.duration_ms))
            .collect()
    }
}
