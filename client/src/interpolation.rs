//! Render-time smoothing of remote entities.
//!
//! Each remote entity keeps its last two authoritative samples. The rendered
//! position eases from the previous sample to the current one over a fixed
//! window that starts when the current sample arrived, and holds at the
//! current sample afterwards. Nothing is extrapolated.

use shared::Pose;

use crate::world::Entity;

/// Quadratic ease-in-out on `[0, 1]`.
pub fn ease_in_out(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start + (end - start) * t
}

/// Linear progress through the interpolation window, clamped to `[0, 1]`.
pub fn blend_factor(last_update_ms: u64, render_time_ms: u64, window_ms: u64) -> f32 {
    if window_ms == 0 {
        return 1.0;
    }
    let elapsed = render_time_ms.saturating_sub(last_update_ms);
    (elapsed as f32 / window_ms as f32).clamp(0.0, 1.0)
}

pub fn blend(previous: Pose, current: Pose, t: f32) -> Pose {
    let eased = ease_in_out(t.clamp(0.0, 1.0));
    Pose::new(
        lerp(previous.x, current.x, eased),
        lerp(previous.y, current.y, eased),
    )
}

/// Display pose of a remote entity at `render_time_ms`.
pub fn pose(entity: &Entity, render_time_ms: u64, window_ms: u64) -> Pose {
    let t = blend_factor(entity.last_update_ms, render_time_ms, window_ms);
    blend(entity.previous, entity.current, t)
}
