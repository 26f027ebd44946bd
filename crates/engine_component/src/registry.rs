//! Type registry: dense integer tags for every concrete kind.
//!
//! Each concrete entity, component, event, and system type is given a
//! [`TypeTag`] by an explicit [`TypeRegistry::register`] call during startup.
//! Tags are dense, start at 0, and live in one independent counter space per
//! [`Kind`]. Stores size their per-kind arrays from the registry when they are
//! finalized, so every participating type must be registered first; the
//! registry is sealed at that point and refuses late registrations.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EcsError;

/// The four independent tag spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// Concrete entity types.
    Entity,
    /// Concrete component types.
    Component,
    /// Concrete event types.
    Event,
    /// Concrete system types.
    System,
}

impl Kind {
    /// All kinds, in counter-space order.
    pub const ALL: [Kind; 4] = [Kind::Entity, Kind::Component, Kind::Event, Kind::System];

    const fn slot(self) -> usize {
        match self {
            Kind::Entity => 0,
            Kind::Component => 1,
            Kind::Event => 2,
            Kind::System => 3,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Entity => "entity",
            Kind::Component => "component",
            Kind::Event => "event",
            Kind::System => "system",
        };
        f.write_str(name)
    }
}

/// A dense per-kind type identifier, usable as an array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(pub u32);

impl TypeTag {
    /// Returns the tag as an array index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One counter space: the next free tag plus the types bound so far.
#[derive(Debug, Clone, Default)]
struct Space {
    next: u32,
    tags: HashMap<TypeId, TypeTag>,
    names: Vec<&'static str>,
}

/// Snapshot of one kind's type-to-tag bindings, handed to a store at
/// finalize time so the store can resolve tags on its own.
#[derive(Debug, Clone)]
pub struct KindIndex {
    kind: Kind,
    tags: HashMap<TypeId, TypeTag>,
    names: Vec<&'static str>,
}

impl KindIndex {
    /// The kind this index covers.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Number of tags allocated in this kind's space.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Looks up the tag of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredKind`] if `T` was not registered before
    /// the owning store was finalized.
    pub fn tag_of<T: 'static>(&self) -> Result<TypeTag, EcsError> {
        self.tags
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(EcsError::UnregisteredKind {
                kind: self.kind,
                name: std::any::type_name::<T>(),
            })
    }

    /// Human-readable name of the type bound to `tag`.
    #[must_use]
    pub fn name(&self, tag: TypeTag) -> &'static str {
        self.names.get(tag.index()).copied().unwrap_or("<anonymous>")
    }
}

/// Allocates dense per-kind type tags.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    spaces: [Space; 4],
    sealed: bool,
}

impl TypeRegistry {
    /// Create an empty, unsealed registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next unused tag in `kind`'s space, without binding it to
    /// a Rust type.
    pub fn next_unique_id(&mut self, kind: Kind) -> TypeTag {
        self.allocate(kind, "<anonymous>")
    }

    /// Returns the highest tag allocated in `kind`'s space, or `None` if none
    /// has been allocated yet.
    #[must_use]
    pub fn last_id(&self, kind: Kind) -> Option<TypeTag> {
        self.spaces[kind.slot()].next.checked_sub(1).map(TypeTag)
    }

    /// Number of tags allocated in `kind`'s space.
    #[must_use]
    pub fn count(&self, kind: Kind) -> usize {
        self.spaces[kind.slot()].next as usize
    }

    /// Binds `T` to a tag in `kind`'s space. Registering the same type twice
    /// returns the original tag.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::RegistrySealed`] once [`TypeRegistry::seal`] has
    /// been called and `T` is not already bound.
    pub fn register<T: 'static>(&mut self, kind: Kind) -> Result<TypeTag, EcsError> {
        let type_id = TypeId::of::<T>();
        if let Some(&tag) = self.spaces[kind.slot()].tags.get(&type_id) {
            return Ok(tag);
        }
        let name = std::any::type_name::<T>();
        if self.sealed {
            return Err(EcsError::RegistrySealed { kind, name });
        }
        let tag = self.allocate(kind, name);
        self.spaces[kind.slot()].tags.insert(type_id, tag);
        debug!(%kind, %tag, name, "registered type");
        Ok(tag)
    }

    /// Returns the tag bound to `T` in `kind`'s space.
    #[must_use]
    pub fn tag_of<T: 'static>(&self, kind: Kind) -> Option<TypeTag> {
        self.spaces[kind.slot()].tags.get(&TypeId::of::<T>()).copied()
    }

    /// Human-readable name of the type bound to `tag`.
    #[must_use]
    pub fn name(&self, kind: Kind, tag: TypeTag) -> Option<&'static str> {
        self.spaces[kind.slot()].names.get(tag.index()).copied()
    }

    /// Freezes the registry. Later registrations of new types fail.
    pub fn seal(&mut self) {
        if !self.sealed {
            debug!(
                entities = self.count(Kind::Entity),
                components = self.count(Kind::Component),
                events = self.count(Kind::Event),
                systems = self.count(Kind::System),
                "type registry sealed"
            );
        }
        self.sealed = true;
    }

    /// Returns `true` once the registry has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Snapshot of `kind`'s bindings for a store to keep.
    #[must_use]
    pub fn index(&self, kind: Kind) -> KindIndex {
        let space = &self.spaces[kind.slot()];
        KindIndex {
            kind,
            tags: space.tags.clone(),
            names: space.names.clone(),
        }
    }

    fn allocate(&mut self, kind: Kind, name: &'static str) -> TypeTag {
        let space = &mut self.spaces[kind.slot()];
        let tag = TypeTag(space.next);
        space.next += 1;
        space.names.push(name);
        tag
    }
}
