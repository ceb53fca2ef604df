//! Physics world using rapier3d

use glam::Vec3;
use rapier3d::prelude::*;

use crate::ai::LineOfSight;

/// Collision group of level geometry that blocks vision
pub const OBSTRUCTION_GROUP: u32 = 1 << 0;

/// Collision group of enemy bodies (never blocks vision)
pub const ACTOR_GROUP: u32 = 1 << 1;

/// Handle to a rigid body in the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RigidBodyHandle(pub rapier3d::dynamics::RigidBodyHandle);

/// Physics world manager
pub struct Physics {
    /// Gravity vector
    pub gravity: Vec3,
    /// Physics pipeline
    pipeline: PhysicsPipeline,
    /// Island manager
    island_manager: IslandManager,
    /// Broad phase
    broad_phase: DefaultBroadPhase,
    /// Narrow phase
    narrow_phase: NarrowPhase,
    /// Rigid body set
    rigid_body_set: RigidBodySet,
    /// Collider set
    collider_set: ColliderSet,
    /// Impulse joint set
    impulse_joint_set: ImpulseJointSet,
    /// Multibody joint set
    multibody_joint_set: MultibodyJointSet,
    /// CCD solver
    ccd_solver: CCDSolver,
    /// Query pipeline for raycasting
    query_pipeline: QueryPipeline,
    /// Integration parameters
    integration_parameters: IntegrationParameters,
}

impl Physics {
    /// Create a new physics world with default gravity
    pub fn new() -> Self {
        Self::with_gravity(Vec3::new(0.0, -9.81, 0.0))
    }

    /// Create a new physics world with custom gravity
    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
        }
    }

    /// Step the physics simulation
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        self.pipeline.step(
            &vector![self.gravity.x, self.gravity.y, self.gravity.z],
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Rebuild the raycast acceleration structure after adding or removing
    /// colliders outside of a step.
    pub fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Add a static box that blocks line of sight
    pub fn add_obstruction(&mut self, center: Vec3, half_extents: Vec3) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![center.x, center.y, center.z])
            .build();
        let handle = self.rigid_body_set.insert(body);

        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .collision_groups(InteractionGroups::new(
                Group::from_bits_truncate(OBSTRUCTION_GROUP),
                Group::ALL,
            ))
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        self.refresh_queries();
        RigidBodyHandle(handle)
    }

    /// Create a velocity-driven body for an actor.
    ///
    /// Actor colliders are invisible to vision raycasts and do not collide
    /// with anything.
    pub fn create_actor_body(&mut self, position: Vec3, radius: f32) -> RigidBodyHandle {
        let body = RigidBodyBuilder::kinematic_velocity_based()
            .translation(vector![position.x, position.y, position.z])
            .build();
        let handle = self.rigid_body_set.insert(body);

        let collider = ColliderBuilder::ball(radius)
            .collision_groups(InteractionGroups::new(
                Group::from_bits_truncate(ACTOR_GROUP),
                Group::NONE,
            ))
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        RigidBodyHandle(handle)
    }

    /// Get the position of a rigid body
    pub fn get_position(&self, body: RigidBodyHandle) -> Option<Vec3> {
        self.rigid_body_set.get(body.0).map(|rb| {
            let pos = rb.translation();
            Vec3::new(pos.x, pos.y, pos.z)
        })
    }

    /// Teleport a rigid body
    pub fn set_position(&mut self, body: RigidBodyHandle, position: Vec3) {
        if let Some(rb) = self.rigid_body_set.get_mut(body.0) {
            rb.set_translation(vector![position.x, position.y, position.z], true);
        }
    }

    /// Set the linear velocity of a body
    pub fn set_linear_velocity(&mut self, body: RigidBodyHandle, velocity: Vec3) {
        if let Some(rb) = self.rigid_body_set.get_mut(body.0) {
            rb.set_linvel(vector![velocity.x, velocity.y, velocity.z], true);
        }
    }

    /// Get the linear velocity of a body
    pub fn get_linear_velocity(&self, body: RigidBodyHandle) -> Option<Vec3> {
        self.rigid_body_set.get(body.0).map(|rb| {
            let vel = rb.linvel();
            Vec3::new(vel.x, vel.y, vel.z)
        })
    }

    /// Cast a ray against colliders whose groups intersect `mask`
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: u32,
    ) -> Option<RaycastHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }

        let ray = Ray::new(
            point![origin.x, origin.y, origin.z],
            vector![direction.x, direction.y, direction.z],
        );
        let filter = QueryFilter::default().groups(InteractionGroups::new(
            Group::ALL,
            Group::from_bits_truncate(mask),
        ));

        self.query_pipeline
            .cast_ray(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                max_distance,
                true,
                filter,
            )
            .map(|(_, distance)| {
                let point = ray.point_at(distance);
                RaycastHit {
                    point: Vec3::new(point.x, point.y, point.z),
                    distance,
                }
            })
    }

    /// Remove a rigid body and its colliders
    pub fn remove_body(&mut self, body: RigidBodyHandle) {
        self.rigid_body_set.remove(
            body.0,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    /// Number of rigid bodies in the world
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

impl Default for Physics {
    fn default() -> Self {
        Self::new()
    }
}

impl LineOfSight for Physics {
    fn is_obstructed(&self, from: Vec3, to: Vec3, mask: u32) -> bool {
        let distance = from.distance(to);
        self.raycast(from, to - from, distance, mask).is_some()
    }
}

/// Result of a raycast
#[derive(Debug, Clone)]
pub struct RaycastHit {
    /// The point of intersection
    pub point: Vec3,
    /// Distance from ray origin
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obstruction_blocks_ray() {
        let mut physics = Physics::new();
        physics.add_obstruction(Vec3::new(0.0, 1.0, -5.0), Vec3::new(2.0, 2.0, 0.5));

        let hit = physics.raycast(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Z, 20.0, OBSTRUCTION_GROUP);
        let hit = hit.expect("wall should be hit");
        assert!((hit.distance - 4.5).abs() < 0.01);

        assert!(physics.is_obstructed(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, -10.0),
            OBSTRUCTION_GROUP
        ));
    }

    #[test]
    fn test_mask_filters_obstruction() {
        let mut physics = Physics::new();
        physics.add_obstruction(Vec3::new(0.0, 1.0, -5.0), Vec3::new(2.0, 2.0, 0.5));

        // A mask without the obstruction group sees through the wall
        assert!(
            physics
                .raycast(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Z, 20.0, 1 << 5)
                .is_none()
        );
    }

    #[test]
    fn test_actor_bodies_do_not_block_vision() {
        let mut physics = Physics::new();
        physics.create_actor_body(Vec3::new(0.0, 1.0, -5.0), 0.5);
        physics.refresh_queries();

        assert!(!physics.is_obstructed(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, -10.0),
            OBSTRUCTION_GROUP
        ));
    }

    #[test]
    fn test_ray_stops_short_of_wall() {
        let mut physics = Physics::new();
        physics.add_obstruction(Vec3::new(0.0, 1.0, -5.0), Vec3::new(2.0, 2.0, 0.5));

        // Target in front of the wall
        assert!(!physics.is_obstructed(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, -3.0),
            OBSTRUCTION_GROUP
        ));
    }

    #[test]
    fn test_actor_body_integrates_velocity() {
        let mut physics = Physics::new();
        let body = physics.create_actor_body(Vec3::ZERO, 0.5);

        physics.set_linear_velocity(body, Vec3::new(2.0, 0.0, 0.0));
        for _ in 0..10 {
            physics.step(0.1);
        }

        let position = physics.get_position(body).unwrap();
        assert!((position.x - 2.0).abs() < 0.05);

        physics.remove_body(body);
        assert_eq!(physics.body_count(), 0);
    }
}
