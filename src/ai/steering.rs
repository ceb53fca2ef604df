//! Steering helpers for AI movement
//!
//! Bounded rotation and velocity blending used by controllers to actuate
//! what their states decide. Everything works on the XZ plane with -Z as
//! forward.

use glam::{Quat, Vec3};

/// Project a vector onto the ground plane
#[inline]
#[must_use]
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Yaw-only rotation whose forward (-Z) points along `direction`.
///
/// Returns `None` for directions with no horizontal component.
#[must_use]
pub fn look_rotation(direction: Vec3) -> Option<Quat> {
    let flat = flatten(direction);
    if flat.length_squared() < 1e-8 {
        return None;
    }
    Some(Quat::from_rotation_y((-flat.x).atan2(-flat.z)))
}

/// Rotate `from` toward `to` by at most `max_degrees`.
#[must_use]
pub fn rotate_towards(from: Quat, to: Quat, max_degrees: f32) -> Quat {
    let angle = from.angle_between(to);
    let max_radians = max_degrees.max(0.0).to_radians();
    if angle <= max_radians || angle < 1e-6 {
        return to;
    }
    from.slerp(to, max_radians / angle).normalize()
}

/// Rotate toward facing `target` from `position` by at most `max_degrees`.
#[must_use]
pub fn turn_toward(rotation: Quat, position: Vec3, target: Vec3, max_degrees: f32) -> Quat {
    match look_rotation(target - position) {
        Some(look) => rotate_towards(rotation, look, max_degrees),
        None => rotation,
    }
}

/// Horizontal angle in degrees between `forward` and the direction to `target`.
#[must_use]
pub fn angle_to(forward: Vec3, position: Vec3, target: Vec3) -> f32 {
    let to_target = flatten(target - position);
    let forward = flatten(forward);
    if to_target.length_squared() < 1e-8 || forward.length_squared() < 1e-8 {
        return 0.0;
    }
    forward.angle_between(to_target).to_degrees()
}

/// Move `current` toward `target` by at most `max_delta`.
#[must_use]
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let delta = target - current;
    let distance = delta.length();
    if distance <= max_delta || distance < 1e-6 {
        return target;
    }
    current + delta / distance * max_delta
}

/// Horizontal direction pointing away from `threat`
#[must_use]
pub fn flee_direction(position: Vec3, threat: Vec3) -> Vec3 {
    flatten(position - threat).normalize_or_zero()
}

/// Speed for arriving at a point `distance` away: full speed outside
/// `slow_radius`, scaled down inside it, and zero within `target_radius`.
#[must_use]
pub fn arrive_speed(distance: f32, max_speed: f32, slow_radius: f32, target_radius: f32) -> f32 {
    if distance < target_radius {
        return 0.0;
    }

    if distance > slow_radius || slow_radius <= 0.0 {
        max_speed
    } else {
        max_speed * distance / slow_radius
    }
}

/// Apply linear drag for `dt` seconds
#[must_use]
pub fn apply_drag(velocity: Vec3, drag: f32, dt: f32) -> Vec3 {
    velocity * (1.0 - drag * dt).clamp(0.0, 1.0)
}
