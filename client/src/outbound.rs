//! Outbound position rate limiting.
//!
//! Input is sampled every tick but a position update only goes out when the
//! pose differs from what the server was last sent and the minimum interval
//! since that send has passed. A pose held back by the interval goes out on
//! the first tick after it, even if the player has stopped moving. Actions
//! bypass this entirely.

use shared::{PlayerId, Pose, PositionUpdate};

/// The last position update that went out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingInput {
    pub pose: Pose,
    pub flip_x: bool,
    pub sent_at_ms: u64,
}

pub struct OutboundLimiter {
    player_id: PlayerId,
    min_interval_ms: u64,
    last_tick: (Pose, bool),
    last_sent: Option<PendingInput>,
}

impl OutboundLimiter {
    pub fn new(player_id: PlayerId, min_interval_ms: u64, initial: Pose) -> Self {
        Self {
            player_id,
            min_interval_ms,
            last_tick: (initial, false),
            last_sent: None,
        }
    }

    pub fn last_sent(&self) -> Option<&PendingInput> {
        self.last_sent.as_ref()
    }

    /// Call once per tick with the local pose after input was applied.
    pub fn maybe_send(&mut self, pose: Pose, flip_x: bool, now_ms: u64) -> Option<PositionUpdate> {
        let moved = (pose, flip_x) != self.last_tick;
        self.last_tick = (pose, flip_x);

        match &self.last_sent {
            None if !moved => return None,
            None => {}
            Some(last) => {
                if (last.pose, last.flip_x) == (pose, flip_x) {
                    return None;
                }
                if now_ms.saturating_sub(last.sent_at_ms) < self.min_interval_ms {
                    return None;
                }
            }
        }

        self.last_sent = Some(PendingInput {
            pose,
            flip_x,
            sent_at_ms: now_ms,
        });
        Some(PositionUpdate {
            id: self.player_id,
            x: pose.x,
            y: pose.y,
            flip_x,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_pose_is_not_sent() {
        let mut limiter = OutboundLimiter::new(1, 10, Pose::new(0.0, 0.0));
        assert!(limiter.maybe_send(Pose::new(0.0, 0.0), false, 100).is_none());
        assert!(limiter.last_sent().is_none());
    }

    #[test]
    fn test_first_change_is_sent() {
        let mut limiter = OutboundLimiter::new(7, 10, Pose::new(0.0, 0.0));
        let update = limiter.maybe_send(Pose::new(10.0, 0.0), false, 5).unwrap();
        assert_eq!(update.id, 7);
        assert_eq!(update.x, 10.0);
        assert_eq!(limiter.last_sent().unwrap().sent_at_ms, 5);
    }

    #[test]
    fn test_flip_change_counts_as_change() {
        let mut limiter = OutboundLimiter::new(1, 10, Pose::new(0.0, 0.0));
        let update = limiter.maybe_send(Pose::new(0.0, 0.0), true, 50).unwrap();
        assert!(update.flip_x);
    }

    #[test]
    fn test_changes_inside_interval_are_held_back() {
        let mut limiter = OutboundLimiter::new(1, 16, Pose::new(0.0, 0.0));
        assert!(limiter.maybe_send(Pose::new(10.0, 0.0), false, 0).is_some());
        assert!(limiter.maybe_send(Pose::new(20.0, 0.0), false, 5).is_none());
        assert!(limiter.maybe_send(Pose::new(30.0, 0.0), false, 15).is_none());
        assert!(limiter.maybe_send(Pose::new(40.0, 0.0), false, 16).is_some());
    }

    #[test]
    fn test_held_back_pose_is_sent_after_player_stops() {
        let mut limiter = OutboundLimiter::new(1, 10, Pose::new(0.0, 0.0));
        assert!(limiter.maybe_send(Pose::new(10.0, 0.0), false, 0).is_some());
        assert!(limiter.maybe_send(Pose::new(20.0, 0.0), false, 7).is_none());

        let update = limiter.maybe_send(Pose::new(20.0, 0.0), false, 14).unwrap();
        assert_eq!(update.x, 20.0);
        assert_eq!(limiter.last_sent().unwrap().pose, Pose::new(20.0, 0.0));

        for now in [21, 28, 100, 1_000] {
            assert!(limiter.maybe_send(Pose::new(20.0, 0.0), false, now).is_none());
        }
    }

    #[test]
    fn test_returning_to_sent_pose_sends_nothing() {
        let mut limiter = OutboundLimiter::new(1, 10, Pose::new(0.0, 0.0));
        assert!(limiter.maybe_send(Pose::new(10.0, 0.0), false, 0).is_some());
        assert!(limiter.maybe_send(Pose::new(20.0, 0.0), false, 3).is_none());
        assert!(limiter.maybe_send(Pose::new(10.0, 0.0), false, 6).is_none());
        assert!(limiter.maybe_send(Pose::new(10.0, 0.0), false, 50).is_none());
    }

    #[test]
    fn test_interval_is_respected_for_any_tick_rate() {
        for min_interval in [10u64, 16] {
            for tick_ms in 1u64..=20 {
                let mut limiter = OutboundLimiter::new(1, min_interval, Pose::new(0.0, 0.0));
                let mut sent = Vec::new();
                let mut pose = Pose::new(0.0, 0.0);

                let mut now = 0;
                while now < 1_000 {
                    pose = pose.translate(1.0, 0.0);
                    if limiter.maybe_send(pose, false, now).is_some() {
                        sent.push(now);
                    }
                    now += tick_ms;
                }

                assert!(!sent.is_empty());
                for pair in sent.windows(2) {
                    assert!(
                        pair[1] - pair[0] >= min_interval,
                        "sends at {} and {} with tick {}ms",
                        pair[0],
                        pair[1],
                        tick_ms
                    );
                }
            }
        }
    }
}
