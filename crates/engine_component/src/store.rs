//! Component storage.
//!
//! Every component lives in a per-kind column indexed by its owner's entity
//! slot, which gives O(1) attach and lookup and lets renderers walk "every
//! entity with component K". A second index lists the kinds attached to each
//! entity so destroying an entity only visits its own components.
//!
//! Columns grow lazily to the highest entity slot seen and never shrink. That
//! trades memory for constant-time access and suits worlds of modest size;
//! large worlds would want a sparse set per kind instead.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::entity::Entity;
use crate::error::EcsError;
use crate::registry::{Kind, KindIndex, TypeRegistry, TypeTag};

/// Marker for data records that can be attached to entities.
pub trait Component: Any {}

/// One occupied cell of a column.
#[derive(Debug)]
struct Cell {
    owner: Entity,
    value: Box<dyn Any>,
}

/// A type-erased view of one component, as returned by
/// [`ComponentStore::all_of`].
#[derive(Debug, Clone, Copy)]
pub struct ComponentRef<'a> {
    /// The entity that owns the component.
    pub owner: Entity,
    /// The component's kind tag.
    pub kind: TypeTag,
    /// The component type's name.
    pub name: &'static str,
    value: &'a dyn Any,
}

impl<'a> ComponentRef<'a> {
    /// Downcast to the concrete component type.
    #[must_use]
    pub fn downcast<C: Component>(&self) -> Option<&'a C> {
        self.value.downcast_ref::<C>()
    }
}

/// Index-based reference to one component of one entity.
///
/// Handles stay valid across column growth and resolve to `None` once the
/// component or its owner is gone.
pub struct ComponentHandle<C> {
    /// The owning entity.
    pub entity: Entity,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Component> ComponentHandle<C> {
    /// Refer to the `C` component of `entity`.
    #[must_use]
    pub const fn new(entity: Entity) -> Self {
        Self {
            entity,
            _marker: PhantomData,
        }
    }
}

impl<C> Clone for ComponentHandle<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ComponentHandle<C> {}

impl<C> PartialEq for ComponentHandle<C> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl<C> Eq for ComponentHandle<C> {}

impl<C> fmt::Debug for ComponentHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("entity", &self.entity)
            .field("kind", &std::any::type_name::<C>())
            .finish()
    }
}

/// Owns every component instance, indexed by kind and by entity.
#[derive(Debug, Default)]
pub struct ComponentStore {
    index: Option<KindIndex>,
    /// `columns[kind][entity slot]`.
    columns: Vec<Vec<Option<Cell>>>,
    /// `by_entity[entity slot]` lists the kinds attached to that entity.
    by_entity: Vec<Vec<TypeTag>>,
    count: usize,
}

impl ComponentStore {
    /// Create an empty store. It must be finalized before use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Size one column per registered component kind.
    ///
    /// # Errors
    ///
    /// Fails if the registry is not sealed or the store was finalized before.
    pub fn finalize(&mut self, registry: &TypeRegistry) -> Result<(), EcsError> {
        if !registry.is_sealed() {
            return Err(EcsError::RegistryNotSealed("component store"));
        }
        if self.index.is_some() {
            return Err(EcsError::AlreadyFinalized("component store"));
        }
        let index = registry.index(Kind::Component);
        self.columns = (0..index.len()).map(|_| Vec::new()).collect();
        debug!(kinds = index.len(), "component store finalized");
        self.index = Some(index);
        Ok(())
    }

    fn tag_of<C: Component>(&self) -> Result<TypeTag, EcsError> {
        self.index
            .as_ref()
            .ok_or(EcsError::NotFinalized("component store"))?
            .tag_of::<C>()
    }

    fn name_of(&self, kind: TypeTag) -> &'static str {
        self.index
            .as_ref()
            .map_or("<unknown>", |index| index.name(kind))
    }

    fn cell(&self, kind: TypeTag, entity: Entity) -> Option<&Cell> {
        self.columns
            .get(kind.index())?
            .get(entity.index() as usize)?
            .as_ref()
            .filter(|cell| cell.owner == entity)
    }

    fn cell_mut(&mut self, kind: TypeTag, entity: Entity) -> Option<&mut Cell> {
        self.columns
            .get_mut(kind.index())?
            .get_mut(entity.index() as usize)?
            .as_mut()
            .filter(|cell| cell.owner == entity)
    }

    /// Attach `value` to `entity`, replacing any existing `C` on it.
    ///
    /// The store does not know which entities are live; use
    /// `World::add_component` to reject dead handles.
    ///
    /// # Errors
    ///
    /// Fails if the store is not finalized or `C` was never registered, and
    /// with [`EcsError::InvalidEntity`] if a newer generation of the slot
    /// already owns components.
    pub fn add<C: Component>(&mut self, entity: Entity, value: C) -> Result<&mut C, EcsError> {
        let kind = self.tag_of::<C>()?;
        let row = entity.index() as usize;

        if let Some(owner) = self.newest_owner(row) {
            if owner.generation() > entity.generation() {
                debug!(%entity, %owner, "add rejected: slot has a newer occupant");
                return Err(EcsError::InvalidEntity(entity));
            }
        }
        // A cell left by an older generation of this slot is discarded.
        self.purge_stale(row, entity);

        let column = &mut self.columns[kind.index()];
        if column.len() <= row {
            column.resize_with(row + 1, || None);
        }
        if self.by_entity.len() <= row {
            self.by_entity.resize_with(row + 1, Vec::new);
        }

        let replaced = column[row].is_some();
        if replaced {
            debug!(%entity, kind = self.name_of(kind), "component replaced");
        } else {
            self.by_entity[row].push(kind);
            self.count += 1;
            trace!(%entity, kind = self.name_of(kind), "component added");
        }

        let cell = self.columns[kind.index()][row].insert(Cell {
            owner: entity,
            value: Box::new(value),
        });
        match cell.value.downcast_mut::<C>() {
            Some(value) => Ok(value),
            None => unreachable!("component cell holds the value just written"),
        }
    }

    /// Detach and return the `C` component of `entity`.
    ///
    /// Returns `None` if there was nothing to remove.
    pub fn remove<C: Component>(&mut self, entity: Entity) -> Option<C> {
        let kind = self.tag_of::<C>().ok()?;
        let value = self.take(kind, entity)?;
        value.downcast::<C>().ok().map(|boxed| *boxed)
    }

    fn take(&mut self, kind: TypeTag, entity: Entity) -> Option<Box<dyn Any>> {
        self.cell(kind, entity)?;
        let row = entity.index() as usize;
        let cell = self.columns[kind.index()][row].take()?;
        let kinds = &mut self.by_entity[row];
        match kinds.iter().position(|&k| k == kind) {
            Some(pos) => {
                kinds.remove(pos);
            }
            None => panic!("component index out of sync for {entity}: kind {kind} not listed"),
        }
        self.count -= 1;
        trace!(%entity, kind = self.name_of(kind), "component removed");
        Some(cell.value)
    }

    /// Remove every component attached to `entity`, returning how many were
    /// removed.
    pub fn remove_all_of(&mut self, entity: Entity) -> usize {
        let removed = self.clear_row(entity.index() as usize, |owner| owner == entity);
        if removed > 0 {
            trace!(%entity, removed, "removed all components of entity");
        }
        removed
    }

    /// The owner with the highest generation among the cells in `row`.
    fn newest_owner(&self, row: usize) -> Option<Entity> {
        self.by_entity
            .get(row)?
            .iter()
            .filter_map(|kind| self.columns[kind.index()][row].as_ref())
            .map(|cell| cell.owner)
            .max_by_key(|owner| owner.generation())
    }

    /// Drop cells in `row` left behind by an older generation of the slot.
    fn purge_stale(&mut self, row: usize, entity: Entity) {
        let purged = self.clear_row(row, |owner| owner.generation() < entity.generation());
        if purged > 0 {
            debug!(%entity, purged, "discarded components of a previous slot occupant");
        }
    }

    fn clear_row(&mut self, row: usize, mut matches: impl FnMut(Entity) -> bool) -> usize {
        let Some(kinds) = self.by_entity.get_mut(row) else {
            return 0;
        };
        let columns = &mut self.columns;
        let mut cleared = 0;
        kinds.retain(|kind| {
            let slot = &mut columns[kind.index()][row];
            if slot.as_ref().is_some_and(|cell| matches(cell.owner)) {
                *slot = None;
                cleared += 1;
                false
            } else {
                true
            }
        });
        self.count -= cleared;
        cleared
    }

    /// Returns the `C` component of `entity`.
    #[must_use]
    pub fn get<C: Component>(&self, entity: Entity) -> Option<&C> {
        let kind = self.tag_of::<C>().ok()?;
        self.cell(kind, entity)?.value.downcast_ref::<C>()
    }

    /// Mutable variant of [`ComponentStore::get`].
    #[must_use]
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        let kind = self.tag_of::<C>().ok()?;
        self.cell_mut(kind, entity)?.value.downcast_mut::<C>()
    }

    /// Returns `true` if `entity` has a `C` component.
    #[must_use]
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.get::<C>(entity).is_some()
    }

    /// Resolve an index-based handle.
    #[must_use]
    pub fn resolve<C: Component>(&self, handle: ComponentHandle<C>) -> Option<&C> {
        self.get::<C>(handle.entity)
    }

    /// Mutable variant of [`ComponentStore::resolve`].
    #[must_use]
    pub fn resolve_mut<C: Component>(&mut self, handle: ComponentHandle<C>) -> Option<&mut C> {
        self.get_mut::<C>(handle.entity)
    }

    /// The dense column for `C`, indexed by entity slot, with `None` holes.
    ///
    /// The column is only as long as the highest slot that ever held a `C`.
    pub fn all_of_kind<C: Component>(&self) -> impl ExactSizeIterator<Item = Option<&C>> {
        let column = self
            .tag_of::<C>()
            .ok()
            .and_then(|kind| self.columns.get(kind.index()))
            .map_or(&[] as &[Option<Cell>], Vec::as_slice);
        column
            .iter()
            .map(|slot| slot.as_ref().and_then(|cell| cell.value.downcast_ref::<C>()))
    }

    /// Every `C` component with its owner, in slot order.
    pub fn iter<C: Component>(&self) -> impl Iterator<Item = (Entity, &C)> {
        let column = self
            .tag_of::<C>()
            .ok()
            .and_then(|kind| self.columns.get(kind.index()))
            .map_or(&[] as &[Option<Cell>], Vec::as_slice);
        column.iter().filter_map(|slot| {
            let cell = slot.as_ref()?;
            cell.value.downcast_ref::<C>().map(|value| (cell.owner, value))
        })
    }

    /// Mutable variant of [`ComponentStore::iter`].
    pub fn iter_mut<C: Component>(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        let kind = self.tag_of::<C>().ok();
        let column = match kind.and_then(|kind| self.columns.get_mut(kind.index())) {
            Some(column) => column.as_mut_slice(),
            None => Default::default(),
        };
        column.iter_mut().filter_map(|slot| {
            let cell = slot.as_mut()?;
            let owner = cell.owner;
            cell.value.downcast_mut::<C>().map(|value| (owner, value))
        })
    }

    /// Every component attached to `entity`, in attach order.
    #[must_use]
    pub fn all_of(&self, entity: Entity) -> Vec<ComponentRef<'_>> {
        let Some(kinds) = self.by_entity.get(entity.index() as usize) else {
            return Vec::new();
        };
        kinds
            .iter()
            .filter_map(|&kind| {
                let cell = self.cell(kind, entity)?;
                Some(ComponentRef {
                    owner: entity,
                    kind,
                    name: self.name_of(kind),
                    value: cell.value.as_ref(),
                })
            })
            .collect()
    }

    /// Total number of live components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if no component is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of registered component kinds (columns).
    #[must_use]
    pub fn kind_count(&self) -> usize {
        self.columns.len()
    }
}

impl Drop for ComponentStore {
    fn drop(&mut self) {
        if self.count > 0 {
            debug!(released = self.count, "component store released remaining components");
        }
    }
}
