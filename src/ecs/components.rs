//! Common ECS components

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position and orientation of an entity.
///
/// Forward is negative Z in local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position in world space
    pub position: Vec3,
    /// Rotation as a quaternion
    pub rotation: Quat,
}

impl Transform {
    /// Create a new transform at the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transform with just a position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and a yaw angle in radians
    pub fn from_position_yaw(position: Vec3, yaw: f32) -> Self {
        Self {
            position,
            rotation: Quat::from_rotation_y(yaw),
        }
    }

    /// Get the forward direction (negative Z in local space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Get the right direction (positive X in local space)
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Translate by a delta
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Velocity component, written by the physics step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub linear: Vec3,
}

/// Name component for logging
#[derive(Debug, Clone)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Marker for the player entity every enemy targets
#[derive(Debug, Clone, Copy, Default)]
pub struct Player;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_directions() {
        let transform = Transform::new();

        assert!((transform.forward() - Vec3::NEG_Z).length() < 0.001);
        assert!((transform.right() - Vec3::X).length() < 0.001);
    }

    #[test]
    fn test_transform_yaw() {
        let transform =
            Transform::from_position_yaw(Vec3::ZERO, std::f32::consts::FRAC_PI_2);

        // Quarter turn left: forward points down -X
        assert!((transform.forward() - Vec3::NEG_X).length() < 0.001);
    }
}
