//! Entity handles and the entity store.
//!
//! An [`Entity`] is a lightweight handle with no data of its own: a slot
//! index plus the slot's generation. Components are attached to entities to
//! give them meaning. Slot indices are reused once an entity is destroyed,
//! but the generation changes, so an old handle never aliases the newcomer.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::EcsError;
use crate::registry::{Kind, KindIndex, TypeRegistry, TypeTag};
use crate::slot_pool::{SlotKey, SlotPool};
use crate::store::ComponentStore;

/// A generation-tagged entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(SlotKey);

impl Entity {
    /// Create an entity handle from raw parts.
    #[must_use]
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self(SlotKey::from_parts(index, generation))
    }

    /// The slot index. Stable for the entity's lifetime; doubles as the row
    /// in every per-kind component column.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0.index()
    }

    /// The slot generation this handle was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.0.generation()
    }

    pub(crate) const fn key(self) -> SlotKey {
        self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Marker for concrete entity kinds (`Player`, `Enemy`, ...).
///
/// Entity objects usually carry no data; they exist so each entity has a
/// kind, registered under [`Kind::Entity`].
pub trait EntityType: Any {}

#[derive(Debug)]
struct EntityRecord {
    kind: TypeTag,
    object: Box<dyn Any>,
}

/// Owns every live entity object in a stable-index slot pool.
#[derive(Debug, Default)]
pub struct EntityStore {
    index: Option<KindIndex>,
    pool: SlotPool<EntityRecord>,
}

impl EntityStore {
    /// Create an empty store. It must be finalized before entities can be
    /// created.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the store to the registry's entity kinds.
    ///
    /// # Errors
    ///
    /// Fails if the registry is not sealed or the store was finalized before.
    pub fn finalize(&mut self, registry: &TypeRegistry) -> Result<(), EcsError> {
        if !registry.is_sealed() {
            return Err(EcsError::RegistryNotSealed("entity store"));
        }
        if self.index.is_some() {
            return Err(EcsError::AlreadyFinalized("entity store"));
        }
        let index = registry.index(Kind::Entity);
        debug!(kinds = index.len(), "entity store finalized");
        self.index = Some(index);
        Ok(())
    }

    /// Create an entity of kind `T`, returning its handle. The lowest free
    /// slot is reused.
    ///
    /// # Errors
    ///
    /// Fails if the store is not finalized or `T` was never registered.
    pub fn create<T: EntityType>(&mut self, object: T) -> Result<Entity, EcsError> {
        let index = self.index.as_ref().ok_or(EcsError::NotFinalized("entity store"))?;
        let kind = index.tag_of::<T>()?;
        let entity = Entity(self.pool.append(EntityRecord {
            kind,
            object: Box::new(object),
        }));
        trace!(%entity, kind = index.name(kind), "entity created");
        Ok(entity)
    }

    /// Destroy `entity`, first removing every component it owns.
    ///
    /// Returns `false` without side effects if the handle is out of range,
    /// freed, or stale.
    pub fn destroy(&mut self, entity: Entity, components: &mut ComponentStore) -> bool {
        if !self.pool.contains(entity.key()) {
            debug!(%entity, "destroy ignored: invalid entity");
            return false;
        }
        let removed = components.remove_all_of(entity);
        let released = self.pool.remove(entity.key()).is_some();
        trace!(%entity, components = removed, "entity destroyed");
        released
    }

    /// Returns the entity object if `entity` is live and of kind `T`.
    #[must_use]
    pub fn get<T: EntityType>(&self, entity: Entity) -> Option<&T> {
        self.pool.get(entity.key())?.object.downcast_ref::<T>()
    }

    /// Mutable variant of [`EntityStore::get`].
    #[must_use]
    pub fn get_mut<T: EntityType>(&mut self, entity: Entity) -> Option<&mut T> {
        self.pool.get_mut(entity.key())?.object.downcast_mut::<T>()
    }

    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.pool.contains(entity.key())
    }

    /// The kind tag of a live entity.
    #[must_use]
    pub fn kind_of(&self, entity: Entity) -> Option<TypeTag> {
        self.pool.get(entity.key()).map(|record| record.kind)
    }

    /// The live entity currently occupying slot `index`.
    #[must_use]
    pub fn at_index(&self, index: u32) -> Option<Entity> {
        self.pool.key_at(index).map(Entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Returns `true` if no entity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Iterate live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.pool.iter().map(|(key, _)| Entity(key))
    }
}

impl Drop for EntityStore {
    fn drop(&mut self) {
        let released = self.pool.drain().len();
        if released > 0 {
            debug!(released, "entity store released remaining entities");
        }
    }
}
