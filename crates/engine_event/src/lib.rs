//! # engine_event
//!
//! One-shot broadcast messaging between systems.
//!
//! This crate provides:
//!
//! - [`Event`]: marker trait for event payloads.
//! - [`EventBroker`]: subscriptions, per-listener FIFO queues, and
//!   acknowledgement-counted event lifetimes.
//! - [`EventId`] / [`ListenerId`]: generation-checked event handle and the
//!   listener capability.
//! - [`EventError`]: broker error types.

pub mod broker;
pub mod error;
pub mod event;

pub use broker::EventBroker;
pub use error::EventError;
pub use event::{Event, EventId, ListenerId};
