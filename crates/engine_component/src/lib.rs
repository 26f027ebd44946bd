//! # engine_component
//!
//! The storage layer of the runtime: type tags, entity identity, and
//! component data.
//!
//! This crate provides:
//!
//! - [`TypeRegistry`]: dense per-kind type tags, sealed before stores size
//!   themselves.
//! - [`SlotPool`]: index-stable container with generation-checked keys.
//! - [`EntityStore`]: creates and destroys entities, cascading into the
//!   component store.
//! - [`ComponentStore`]: per-kind columns plus a per-entity index.
//! - [`EcsError`]: startup misconfiguration and dead-handle errors.

pub mod entity;
pub mod error;
pub mod registry;
pub mod slot_pool;
pub mod store;

pub use entity::{Entity, EntityStore, EntityType};
pub use error::EcsError;
pub use registry::{Kind, KindIndex, TypeRegistry, TypeTag};
pub use slot_pool::{SlotKey, SlotPool};
pub use store::{Component, ComponentHandle, ComponentRef, ComponentStore};
