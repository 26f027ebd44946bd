//! # engine_system
//!
//! Per-tick behaviour for the runtime.
//!
//! This crate provides:
//!
//! - [`System`]: the contract every per-tick behaviour unit implements.
//! - [`SystemContext`]: what a system sees during its turn: the world and a
//!   cooperative stop switch.
//! - [`SystemOrder`]: ordered container keyed by descending priority with
//!   registration order breaking ties.
//! - [`PriorityScheduler`]: one instance per system kind, swept in order by
//!   [`PriorityScheduler::update`].
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use engine_ecs::{Kind, TypeRegistry, World};
//! use engine_system::{PriorityScheduler, System, SystemContext, Wake};
//!
//! struct Heartbeat;
//!
//! impl System for Heartbeat {
//!     fn update(&mut self, _ctx: &mut SystemContext<'_>) -> Option<Duration> {
//!         Some(Duration::from_millis(16))
//!     }
//! }
//!
//! let mut registry = TypeRegistry::new();
//! registry.register::<Heartbeat>(Kind::System).unwrap();
//! let mut world = World::new(registry).unwrap();
//!
//! let mut scheduler = PriorityScheduler::new();
//! scheduler.finalize(world.registry()).unwrap();
//! scheduler.register(Heartbeat).unwrap();
//! assert_eq!(scheduler.update(&mut world), Wake::After(Duration::from_millis(16)));
//! ```

pub mod context;
pub mod error;
pub mod order;
pub mod scheduler;
pub mod system;

pub use context::SystemContext;
pub use error::SchedulerError;
pub use order::{OrderKey, SystemOrder};
pub use scheduler::{PriorityScheduler, Wake};
pub use system::{AsAny, System};
