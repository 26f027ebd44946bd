//! # engine_ecs
//!
//! The [`World`] context object. Systems receive it on every update instead
//! of reaching for process-wide managers, so several independent simulations
//! can coexist and tests can build a world from scratch.

pub mod world;

pub use world::{World, WorldStats};

pub use engine_component::{
    Component, ComponentHandle, ComponentRef, ComponentStore, EcsError, Entity, EntityStore,
    EntityType, Kind, TypeRegistry, TypeTag,
};
pub use engine_event::{Event, EventBroker, EventError, EventId, ListenerId};
