//! World state shared by every system.
//!
//! The [`World`] owns the sealed type registry and the three stores. Its
//! fields are public so a system can borrow them independently, e.g. read
//! an event from [`World::events`] while mutating [`World::components`].

use engine_component::{
    Component, ComponentStore, EcsError, Entity, EntityStore, EntityType, TypeRegistry,
};
use engine_event::{Event, EventBroker, EventError, EventId};
use serde::Serialize;
use tracing::{debug, info};

/// Entity, component, and event storage for one simulation.
#[derive(Debug)]
pub struct World {
    registry: TypeRegistry,
    /// Live entities.
    pub entities: EntityStore,
    /// Components of live entities.
    pub components: ComponentStore,
    /// In-flight events and listener queues.
    pub events: EventBroker,
}

/// Object counts, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorldStats {
    /// Live entities.
    pub entities: usize,
    /// Live components.
    pub components: usize,
    /// Events still awaiting acknowledgement.
    pub events_in_flight: usize,
    /// Events sent since the world was created.
    pub events_sent: u64,
}

impl World {
    /// Seal `registry` and finalize every store against it.
    ///
    /// Every concrete entity, component, and event type must be registered
    /// before this call; stores size their per-kind tables here.
    ///
    /// # Errors
    ///
    /// Propagates finalize failures from the stores.
    pub fn new(mut registry: TypeRegistry) -> Result<Self, EcsError> {
        registry.seal();
        let mut entities = EntityStore::new();
        entities.finalize(&registry)?;
        let mut components = ComponentStore::new();
        components.finalize(&registry)?;
        let mut events = EventBroker::new();
        events.finalize(&registry)?;
        info!("world created");
        Ok(Self {
            registry,
            entities,
            components,
            events,
        })
    }

    /// The sealed registry this world was built from.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Create an entity of kind `T`.
    ///
    /// # Errors
    ///
    /// Fails if `T` was never registered.
    pub fn spawn<T: EntityType>(&mut self, object: T) -> Result<Entity, EcsError> {
        self.entities.create(object)
    }

    /// Destroy `entity` together with all its components. Returns `false`
    /// for dead or stale handles.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.entities.destroy(entity, &mut self.components)
    }

    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Attach `value` to a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntity`] for dead or stale handles, and
    /// [`EcsError::UnregisteredKind`] if `C` was never registered.
    pub fn add_component<C: Component>(
        &mut self,
        entity: Entity,
        value: C,
    ) -> Result<&mut C, EcsError> {
        if !self.entities.contains(entity) {
            debug!(%entity, "add_component rejected: invalid entity");
            return Err(EcsError::InvalidEntity(entity));
        }
        self.components.add(entity, value)
    }

    /// Detach the `C` component of `entity`.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> Option<C> {
        self.components.remove::<C>(entity)
    }

    /// The `C` component of `entity`.
    #[must_use]
    pub fn component<C: Component>(&self, entity: Entity) -> Option<&C> {
        self.components.get::<C>(entity)
    }

    /// Mutable variant of [`World::component`].
    #[must_use]
    pub fn component_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        self.components.get_mut::<C>(entity)
    }

    /// Broadcast an event to its current subscribers.
    ///
    /// # Errors
    ///
    /// Fails if `E` was never registered.
    pub fn send<E: Event>(&mut self, event: E) -> Result<EventId, EventError> {
        self.events.send(event)
    }

    /// Current object counts.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            entities: self.entities.len(),
            components: self.components.len(),
            events_in_flight: self.events.len(),
            events_sent: self.events.sent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use engine_component::Kind;

    use super::*;

    struct Player;
    impl EntityType for Player {}

    #[derive(Debug, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Sprite(char);
    impl Component for Sprite {}

    struct Tick;
    impl Event for Tick {}

    fn world() -> World {
        let mut registry = TypeRegistry::new();
        registry.register::<Player>(Kind::Entity).unwrap();
        registry.register::<Health>(Kind::Component).unwrap();
        registry.register::<Sprite>(Kind::Component).unwrap();
        registry.register::<Tick>(Kind::Event).unwrap();
        World::new(registry).unwrap()
    }

    #[test]
    fn test_new_seals_registry() {
        let world = world();
        assert!(world.registry().is_sealed());
        assert_eq!(world.components.kind_count(), 2);
    }

    #[test]
    fn test_despawn_clears_every_component() {
        let mut world = world();
        let e = world.spawn(Player).unwrap();
        world.add_component(e, Health(10)).unwrap();
        world.add_component(e, Sprite('@')).unwrap();

        assert!(world.despawn(e));
        assert!(!world.is_alive(e));
        assert!(world.component::<Health>(e).is_none());
        assert!(world.component::<Sprite>(e).is_none());
        assert!(world.components.is_empty());
        assert!(!world.despawn(e));
    }

    #[test]
    fn test_reused_slot_starts_without_components() {
        let mut world = world();
        let old = world.spawn(Player).unwrap();
        world.add_component(old, Health(1)).unwrap();
        world.despawn(old);

        let new = world.spawn(Player).unwrap();
        assert_eq!(new.index(), old.index());
        assert!(world.component::<Health>(new).is_none());
        assert_eq!(
            world.add_component(old, Health(2)).unwrap_err(),
            EcsError::InvalidEntity(old)
        );
    }

    #[test]
    fn test_stale_handle_cannot_touch_new_occupant() {
        let mut world = world();
        let old = world.spawn(Player).unwrap();
        world.despawn(old);
        let live = world.spawn(Player).unwrap();
        world.add_component(live, Health(10)).unwrap();

        assert_eq!(
            world.components.add(old, Sprite('x')).unwrap_err(),
            EcsError::InvalidEntity(old)
        );
        assert_eq!(world.component::<Health>(live), Some(&Health(10)));
        assert!(world.component::<Sprite>(old).is_none());
        assert!(world.is_alive(live));
        assert!(!world.is_alive(old));
    }

    #[test]
    fn test_component_mut_and_remove() {
        let mut world = world();
        let e = world.spawn(Player).unwrap();
        world.add_component(e, Health(10)).unwrap();
        world.component_mut::<Health>(e).unwrap().0 -= 3;
        assert_eq!(world.remove_component::<Health>(e), Some(Health(7)));
        assert!(world.remove_component::<Health>(e).is_none());
    }

    #[test]
    fn test_stats_serialize() {
        let mut world = world();
        let e = world.spawn(Player).unwrap();
        world.add_component(e, Health(1)).unwrap();
        let l = world.events.create_listener();
        world.events.subscribe::<Tick>(l).unwrap();
        world.send(Tick).unwrap();

        let stats = world.stats();
        assert_eq!(
            stats,
            WorldStats {
                entities: 1,
                components: 1,
                events_in_flight: 1,
                events_sent: 1,
            }
        );
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["events_in_flight"], 1);
    }
}
