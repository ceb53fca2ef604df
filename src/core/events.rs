//! Event Queue for Simulation Output
//!
//! Controllers never talk to audio, effects or UI directly. Everything they
//! want the outside world to know about (state changes, damage, deaths, shots)
//! is published as an [`AiEvent`] in a double-buffered queue.
//!
//! Events pushed during tick N become readable once tick N finishes, and stay
//! readable until tick N+1 finishes.
//!
//! # Example
//!
//! ```ignore
//! sim.tick()?;
//! for event in sim.events().iter() {
//!     if let AiEvent::Died { position, .. } = event {
//!         spawn_explosion(*position);
//!     }
//! }
//! ```

use std::collections::VecDeque;

use glam::Vec3;
use hecs::Entity;

use crate::weapons::Shot;

// ============================================================================
// Event Types
// ============================================================================

/// Things that happened to or were done by an enemy.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AiEvent {
    /// A controller's state machine switched state.
    StateChanged {
        /// The enemy whose state changed
        entity: Entity,
        /// Previous state, `None` on initialization
        from: Option<&'static str>,
        /// New state
        to: &'static str,
    },

    /// An enemy took damage.
    Damaged {
        /// The damaged enemy
        entity: Entity,
        /// Damage applied
        amount: f32,
        /// Where the shot came from, if known
        origin: Option<Vec3>,
        /// Health after the damage
        health: f32,
    },

    /// An enemy died. Consumers spawn the death effect at `position`.
    Died {
        /// The enemy that died (despawned at the end of the tick)
        entity: Entity,
        /// World position of the death
        position: Vec3,
    },

    /// An enemy fired a shot.
    ShotFired {
        /// The shooter
        entity: Entity,
        /// Launch parameters of the projectile
        shot: Shot,
    },

    /// A controller failed setup and was disabled.
    ControllerDisabled {
        /// The disabled enemy
        entity: Entity,
        /// Why setup failed
        reason: String,
    },
}

impl AiEvent {
    /// The entity this event concerns.
    #[must_use]
    pub fn entity(&self) -> Entity {
        match self {
            Self::StateChanged { entity, .. }
            | Self::Damaged { entity, .. }
            | Self::Died { entity, .. }
            | Self::ShotFired { entity, .. }
            | Self::ControllerDisabled { entity, .. } => *entity,
        }
    }
}

// ============================================================================
// Event Queue
// ============================================================================

/// Double-buffered event queue.
#[derive(Debug)]
pub struct EventQueue {
    /// Events being written this tick
    pending: VecDeque<AiEvent>,
    /// Events from the last finished tick
    published: VecDeque<AiEvent>,
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: VecDeque::with_capacity(32),
            published: VecDeque::with_capacity(32),
        }
    }

    /// Push an event; it becomes readable after the next `swap()`.
    #[inline]
    pub fn push(&mut self, event: AiEvent) {
        self.pending.push_back(event);
    }

    /// Publish pending events and start a fresh pending buffer.
    ///
    /// The simulation calls this once at the end of every tick.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.published);
        self.pending.clear();
    }

    /// Iterate over the published events.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AiEvent> {
        self.published.iter()
    }

    /// Drain the published events.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = AiEvent> + '_ {
        self.published.drain(..)
    }

    /// Check if there are no published events.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.published.is_empty()
    }

    /// Number of published events.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.published.len()
    }

    /// Number of events waiting for the next swap.
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Clear all events (both pending and published).
    pub fn clear(&mut self) {
        self.pending.clear();
        self.published.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_entity() -> Entity {
        let mut world = hecs::World::new();
        world.spawn(())
    }

    #[test]
    fn test_event_queue_push_and_swap() {
        let entity = test_entity();
        let mut queue = EventQueue::new();

        queue.push(AiEvent::Died {
            entity,
            position: Vec3::ONE,
        });
        assert!(queue.is_empty(), "Events should not be visible before swap");

        queue.swap();
        assert_eq!(queue.len(), 1);

        let events: Vec<_> = queue.iter().collect();
        assert!(matches!(events[0], AiEvent::Died { position, .. } if *position == Vec3::ONE));
    }

    #[test]
    fn test_event_queue_double_buffer_isolation() {
        let entity = test_entity();
        let mut queue = EventQueue::new();

        queue.push(AiEvent::StateChanged {
            entity,
            from: None,
            to: "Idle",
        });
        queue.swap();

        queue.push(AiEvent::StateChanged {
            entity,
            from: Some("Idle"),
            to: "Pursuing",
        });

        let events: Vec<_> = queue.iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AiEvent::StateChanged { to: "Idle", .. }));

        queue.swap();
        let events: Vec<_> = queue.iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AiEvent::StateChanged { to: "Pursuing", .. }));
    }

    #[test]
    fn test_event_queue_drain_and_clear() {
        let entity = test_entity();
        let mut queue = EventQueue::new();

        queue.push(AiEvent::Damaged {
            entity,
            amount: 10.0,
            origin: None,
            health: 90.0,
        });
        queue.push(AiEvent::Died {
            entity,
            position: Vec3::ZERO,
        });
        queue.swap();

        let events: Vec<_> = queue.drain().collect();
        assert_eq!(events.len(), 2);
        assert!(queue.is_empty());

        queue.push(AiEvent::Died {
            entity,
            position: Vec3::ZERO,
        });
        queue.clear();
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_event_entity_accessor() {
        let entity = test_entity();
        let event = AiEvent::ControllerDisabled {
            entity,
            reason: "no start state".to_string(),
        };

        assert_eq!(event.entity(), entity);
    }
}
