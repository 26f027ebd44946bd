//! Event payloads and the handles that refer to them.

use std::any::Any;
use std::fmt;

use engine_component::{Entity, SlotKey};
use serde::{Deserialize, Serialize};

/// Marker for event payloads.
///
/// Events may name the entity they concern; the broker records it so
/// listeners can filter without downcasting.
pub trait Event: Any {
    /// The entity this event is about, if any.
    fn target(&self) -> Option<Entity> {
        None
    }
}

/// Generation-tagged id of an in-flight event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(SlotKey);

impl EventId {
    pub(crate) const fn new(key: SlotKey) -> Self {
        Self(key)
    }

    pub(crate) const fn key(self) -> SlotKey {
        self.0
    }

    /// The event's slot index. Freed indices are reused by later sends.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0.index()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({})", self.0)
    }
}

/// Capability to receive events. Held by a system; the queue it names is
/// owned by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub(crate) u32);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({})", self.0)
    }
}
