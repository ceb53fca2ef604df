//! World wrapper around hecs

use hecs::Entity;

/// Game world containing the player and every enemy
#[derive(Default)]
pub struct World {
    /// The underlying hecs world
    pub inner: hecs::World,
}

impl World {
    /// Create a new empty world
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: hecs::World::new(),
        }
    }

    /// Spawn an entity with the given components
    pub fn spawn(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        self.inner.spawn(components)
    }

    /// Despawn an entity
    pub fn despawn(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        self.inner.despawn(entity)
    }

    /// Get a reference to a component
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    /// Get a mutable reference to a component
    pub fn get_mut<T: hecs::Component>(
        &mut self,
        entity: Entity,
    ) -> Result<hecs::RefMut<'_, T>, hecs::ComponentError> {
        self.inner.get::<&mut T>(entity)
    }

    /// Check if an entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Get the number of entities
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    /// Check if the world is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Query for entities with specific components
    pub fn query<Q: hecs::Query>(&self) -> hecs::QueryBorrow<'_, Q> {
        self.inner.query::<Q>()
    }

    /// Query for entities with specific components (mutable)
    pub fn query_mut<Q: hecs::Query>(&mut self) -> hecs::QueryMut<'_, Q> {
        self.inner.query_mut::<Q>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Name, Transform};

    #[test]
    fn test_world_spawn_get_despawn() {
        let mut world = World::new();
        let entity = world.spawn((Name::new("grunt"), Transform::default()));

        assert!(world.contains(entity));
        assert_eq!(world.get::<Name>(entity).unwrap().0, "grunt");

        world.get_mut::<Transform>(entity).unwrap().position.x = 3.0;
        assert!((world.get::<Transform>(entity).unwrap().position.x - 3.0).abs() < f32::EPSILON);

        world.despawn(entity).unwrap();
        assert!(world.is_empty());
        assert!(world.despawn(entity).is_err());
    }
}
