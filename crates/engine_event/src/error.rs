//! Broker error types.

use engine_component::EcsError;

use crate::event::{EventId, ListenerId};

/// Errors that can occur while sending or acknowledging events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// Registry or finalize misconfiguration.
    #[error(transparent)]
    Store(#[from] EcsError),

    /// The event was already released, or the id was never issued.
    #[error("invalid event {0}")]
    InvalidEvent(EventId),

    /// The listener id was not created by this broker.
    #[error("unknown listener {0}")]
    UnknownListener(ListenerId),

    /// The listener does not owe an acknowledgement for the event.
    #[error("{listener} is not awaiting {event}")]
    NotPending {
        /// The event being acknowledged.
        event: EventId,
        /// The listener that tried to acknowledge it.
        listener: ListenerId,
    },
}
