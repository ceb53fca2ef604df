//! Vision and range sensing
//!
//! Sensing runs once per tick before any state executes. The simulation
//! evaluates the predicates here against the spatial service and hands each
//! controller a [`Perception`] snapshot, so state logic never queries physics
//! directly.

use glam::Vec3;

use crate::core::SensorConfig;

/// Height of the eyes above a body's origin, used for line-of-sight rays
pub const EYE_HEIGHT: f32 = 1.0;

/// Spatial query used for vision.
pub trait LineOfSight {
    /// Whether anything in `mask` blocks the segment from `from` to `to`
    fn is_obstructed(&self, from: Vec3, to: Vec3, mask: u32) -> bool;
}

/// Line of sight through empty space
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearSight;

impl LineOfSight for ClearSight {
    fn is_obstructed(&self, _from: Vec3, _to: Vec3, _mask: u32) -> bool {
        false
    }
}

/// What a controller knows about the player this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Perception {
    /// Player position, `None` when there is no player
    pub target: Option<Vec3>,
    /// Distance to the player
    pub distance: f32,
    /// Player within `range`
    pub in_range: bool,
    /// Player within the view cone and unobstructed
    pub in_view: bool,
}

/// Euclidean distance check
#[must_use]
pub fn in_range(position: Vec3, target: Vec3, range: f32) -> bool {
    position.distance(target) <= range
}

/// Whether `target` lies within half of `field_of_view` degrees of `forward`.
///
/// A target at the viewer's own position is always in the cone.
#[must_use]
pub fn in_field_of_view(forward: Vec3, position: Vec3, target: Vec3, field_of_view: f32) -> bool {
    let to_target = target - position;
    if to_target.length_squared() < 1e-8 || field_of_view >= 360.0 {
        return true;
    }
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return false;
    }
    forward.angle_between(to_target).to_degrees() <= field_of_view * 0.5
}

/// Full view check: cone, then an unobstructed ray between eye heights.
#[must_use]
pub fn in_view(
    sensors: &SensorConfig,
    forward: Vec3,
    position: Vec3,
    target: Vec3,
    los: &dyn LineOfSight,
) -> bool {
    if sensors.view_requires_range && !in_range(position, target, sensors.range) {
        return false;
    }
    if !in_field_of_view(forward, position, target, sensors.field_of_view) {
        return false;
    }
    let eye = Vec3::Y * EYE_HEIGHT;
    !los.is_obstructed(position + eye, target + eye, sensors.obstruction_mask)
}

/// Build the per-tick snapshot for a viewer at `position` facing `forward`
#[must_use]
pub fn perceive(
    sensors: &SensorConfig,
    forward: Vec3,
    position: Vec3,
    target: Option<Vec3>,
    los: &dyn LineOfSight,
) -> Perception {
    let Some(target) = target else {
        return Perception::default();
    };

    Perception {
        target: Some(target),
        distance: position.distance(target),
        in_range: in_range(position, target, sensors.range),
        in_view: in_view(sensors, forward, position, target, los),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Blocks every ray crossing the plane z = -5
    struct WallAtMinusFive;

    impl LineOfSight for WallAtMinusFive {
        fn is_obstructed(&self, from: Vec3, to: Vec3, _mask: u32) -> bool {
            (from.z + 5.0).signum() != (to.z + 5.0).signum()
        }
    }

    fn sensors() -> SensorConfig {
        SensorConfig {
            range: 20.0,
            field_of_view: 80.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_range_is_inclusive() {
        assert!(in_range(Vec3::ZERO, Vec3::new(0.0, 0.0, -20.0), 20.0));
        assert!(!in_range(Vec3::ZERO, Vec3::new(0.0, 0.0, -20.1), 20.0));
    }

    #[test]
    fn test_field_of_view_half_angle() {
        let forward = Vec3::NEG_Z;
        // 30 degrees off axis, inside a 80 degree cone
        let inside = Vec3::new(30f32.to_radians().sin(), 0.0, -30f32.to_radians().cos());
        // 50 degrees off axis
        let outside = Vec3::new(50f32.to_radians().sin(), 0.0, -50f32.to_radians().cos());

        assert!(in_field_of_view(forward, Vec3::ZERO, inside * 10.0, 80.0));
        assert!(!in_field_of_view(forward, Vec3::ZERO, outside * 10.0, 80.0));
        assert!(!in_field_of_view(forward, Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0), 80.0));
        assert!(in_field_of_view(forward, Vec3::ZERO, Vec3::ZERO, 80.0));
    }

    #[test]
    fn test_out_of_cone_is_never_in_view() {
        let sensors = sensors();
        // Behind, but very close and unobstructed
        assert!(!in_view(&sensors, Vec3::NEG_Z, Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), &ClearSight));
        // Behind and far
        assert!(!in_view(&sensors, Vec3::NEG_Z, Vec3::ZERO, Vec3::new(0.0, 0.0, 100.0), &ClearSight));
    }

    #[test]
    fn test_obstruction_blocks_view() {
        let sensors = sensors();
        assert!(in_view(&sensors, Vec3::NEG_Z, Vec3::ZERO, Vec3::new(0.0, 0.0, -4.0), &WallAtMinusFive));
        assert!(!in_view(&sensors, Vec3::NEG_Z, Vec3::ZERO, Vec3::new(0.0, 0.0, -8.0), &WallAtMinusFive));
    }

    #[test]
    fn test_view_range_gate() {
        let mut sensors = sensors();
        let far = Vec3::new(0.0, 0.0, -50.0);

        assert!(in_view(&sensors, Vec3::NEG_Z, Vec3::ZERO, far, &ClearSight));

        sensors.view_requires_range = true;
        assert!(!in_view(&sensors, Vec3::NEG_Z, Vec3::ZERO, far, &ClearSight));
        assert!(in_view(&sensors, Vec3::NEG_Z, Vec3::ZERO, Vec3::new(0.0, 0.0, -10.0), &ClearSight));
    }

    #[test]
    fn test_perceive_snapshot() {
        let sensors = sensors();

        let snapshot = perceive(&sensors, Vec3::NEG_Z, Vec3::ZERO, Some(Vec3::new(0.0, 0.0, -10.0)), &ClearSight);
        assert!(snapshot.in_range && snapshot.in_view);
        assert!((snapshot.distance - 10.0).abs() < 0.001);

        let nobody = perceive(&sensors, Vec3::NEG_Z, Vec3::ZERO, None, &ClearSight);
        assert_eq!(nobody, Perception::default());
        assert!(!nobody.in_view);
    }
}
