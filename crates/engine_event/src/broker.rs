//! Event broker: broadcast delivery with acknowledgement-counted lifetimes.
//!
//! Sending an event snapshots the listeners subscribed to its kind at that
//! moment and pushes the new [`EventId`] onto each of their queues, in
//! subscription order. A listener that subscribes afterwards never sees the
//! event. The broker owns the payload until every snapshotted listener has
//! acknowledged it, then releases it and frees its slot for reuse.
//!
//! Events sent while a sweep is running land in queues immediately; each
//! listener picks them up on its own next turn.

use std::any::Any;
use std::collections::VecDeque;

use engine_component::{EcsError, Entity, Kind, KindIndex, SlotPool, TypeRegistry, TypeTag};
use tracing::{debug, trace};

use crate::error::EventError;
use crate::event::{Event, EventId, ListenerId};

#[derive(Debug)]
struct EventRecord {
    kind: TypeTag,
    target: Option<Entity>,
    payload: Box<dyn Any>,
    /// Listeners that still owe an acknowledgement.
    awaiting: Vec<ListenerId>,
}

/// Owns in-flight events, subscriptions, and listener queues.
#[derive(Debug, Default)]
pub struct EventBroker {
    index: Option<KindIndex>,
    events: SlotPool<EventRecord>,
    /// `subscribers[event kind]`, in subscription order.
    subscribers: Vec<Vec<ListenerId>>,
    /// `queues[listener]`: ids awaiting that listener, oldest first.
    queues: Vec<VecDeque<EventId>>,
    sent: u64,
}

impl EventBroker {
    /// Create an empty broker. It must be finalized before events can be
    /// sent or subscribed to.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Size one subscriber list per registered event kind.
    ///
    /// # Errors
    ///
    /// Fails if the registry is not sealed or the broker was finalized before.
    pub fn finalize(&mut self, registry: &TypeRegistry) -> Result<(), EcsError> {
        if !registry.is_sealed() {
            return Err(EcsError::RegistryNotSealed("event broker"));
        }
        if self.index.is_some() {
            return Err(EcsError::AlreadyFinalized("event broker"));
        }
        let index = registry.index(Kind::Event);
        self.subscribers = vec![Vec::new(); index.len()];
        debug!(kinds = index.len(), "event broker finalized");
        self.index = Some(index);
        Ok(())
    }

    fn tag_of<E: Event>(&self) -> Result<TypeTag, EcsError> {
        self.index
            .as_ref()
            .ok_or(EcsError::NotFinalized("event broker"))?
            .tag_of::<E>()
    }

    fn name_of(&self, kind: TypeTag) -> &'static str {
        self.index
            .as_ref()
            .map_or("<unknown>", |index| index.name(kind))
    }

    fn check_listener(&self, listener: ListenerId) -> Result<(), EventError> {
        if (listener.0 as usize) < self.queues.len() {
            Ok(())
        } else {
            Err(EventError::UnknownListener(listener))
        }
    }

    /// Create a new listener with an empty queue.
    pub fn create_listener(&mut self) -> ListenerId {
        let listener = ListenerId(self.queues.len() as u32);
        self.queues.push(VecDeque::new());
        trace!(%listener, "listener created");
        listener
    }

    /// Subscribe `listener` to events of kind `E`. Subscribing twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Fails if the listener is unknown, the broker is not finalized, or `E`
    /// was never registered.
    pub fn subscribe<E: Event>(&mut self, listener: ListenerId) -> Result<(), EventError> {
        self.check_listener(listener)?;
        let kind = self.tag_of::<E>()?;
        let subscribers = &mut self.subscribers[kind.index()];
        if subscribers.contains(&listener) {
            debug!(%listener, kind = self.name_of(kind), "already subscribed");
            return Ok(());
        }
        subscribers.push(listener);
        debug!(%listener, kind = self.name_of(kind), "subscribed");
        Ok(())
    }

    /// Broadcast `event` to every listener currently subscribed to its kind.
    ///
    /// With no subscribers the event is released on the spot; its id is
    /// still returned but never resolves.
    ///
    /// # Errors
    ///
    /// Fails if the broker is not finalized or `E` was never registered.
    pub fn send<E: Event>(&mut self, event: E) -> Result<EventId, EventError> {
        let kind = self.tag_of::<E>()?;
        let awaiting = self.subscribers[kind.index()].clone();
        let target = event.target();
        let id = EventId::new(self.events.append(EventRecord {
            kind,
            target,
            payload: Box::new(event),
            awaiting: awaiting.clone(),
        }));
        self.sent += 1;

        if awaiting.is_empty() {
            self.events.remove(id.key());
            debug!(%id, kind = self.name_of(kind), "event dropped: no subscribers");
            return Ok(id);
        }
        for listener in &awaiting {
            self.queues[listener.0 as usize].push_back(id);
        }
        trace!(%id, kind = self.name_of(kind), listeners = awaiting.len(), "event sent");
        Ok(id)
    }

    /// The payload of a live event, if it is of kind `E`.
    #[must_use]
    pub fn get<E: Event>(&self, id: EventId) -> Option<&E> {
        self.events.get(id.key())?.payload.downcast_ref::<E>()
    }

    /// Returns `true` if `id` is live and of kind `E`.
    #[must_use]
    pub fn is<E: Event>(&self, id: EventId) -> bool {
        self.get::<E>(id).is_some()
    }

    /// The kind tag of a live event.
    #[must_use]
    pub fn kind_of(&self, id: EventId) -> Option<TypeTag> {
        self.events.get(id.key()).map(|record| record.kind)
    }

    /// The entity a live event concerns, as reported by [`Event::target`].
    #[must_use]
    pub fn target_of(&self, id: EventId) -> Option<Entity> {
        self.events.get(id.key())?.target
    }

    /// How many acknowledgements a live event is still waiting for.
    #[must_use]
    pub fn pending_count(&self, id: EventId) -> Option<usize> {
        self.events.get(id.key()).map(|record| record.awaiting.len())
    }

    /// Record that `listener` is done with `id`. When the last awaited
    /// acknowledgement arrives the event is released and `true` is returned.
    ///
    /// The payload must not be read through `id` afterwards; once released,
    /// lookups return `None`.
    ///
    /// # Errors
    ///
    /// Fails if the listener is unknown, the event is no longer live, or the
    /// listener does not owe an acknowledgement for it.
    pub fn acknowledge(&mut self, id: EventId, listener: ListenerId) -> Result<bool, EventError> {
        self.check_listener(listener)?;
        let record = self
            .events
            .get_mut(id.key())
            .ok_or(EventError::InvalidEvent(id))?;
        let pos = record
            .awaiting
            .iter()
            .position(|&l| l == listener)
            .ok_or(EventError::NotPending {
                event: id,
                listener,
            })?;
        record.awaiting.remove(pos);
        let done = record.awaiting.is_empty();

        // Acknowledging without popping first is allowed.
        self.queues[listener.0 as usize].retain(|&queued| queued != id);

        if done {
            self.events.remove(id.key());
            trace!(%id, %listener, "event released");
        } else {
            trace!(%id, %listener, "event acknowledged");
        }
        Ok(done)
    }

    /// Pop the oldest id from `listener`'s queue. The listener still owes an
    /// acknowledgement for it.
    pub fn next_event(&mut self, listener: ListenerId) -> Option<EventId> {
        self.queues.get_mut(listener.0 as usize)?.pop_front()
    }

    /// The oldest id in `listener`'s queue, without popping it.
    #[must_use]
    pub fn peek_event(&self, listener: ListenerId) -> Option<EventId> {
        self.queues.get(listener.0 as usize)?.front().copied()
    }

    /// Ids queued for `listener`, oldest first.
    pub fn queue(&self, listener: ListenerId) -> impl Iterator<Item = EventId> + '_ {
        self.queues
            .get(listener.0 as usize)
            .into_iter()
            .flat_map(|queue| queue.iter().copied())
    }

    /// Number of ids queued for `listener`.
    #[must_use]
    pub fn queue_len(&self, listener: ListenerId) -> usize {
        self.queues.get(listener.0 as usize).map_or(0, VecDeque::len)
    }

    /// Number of listeners subscribed to kind `E`.
    #[must_use]
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.tag_of::<E>()
            .ok()
            .map_or(0, |kind| self.subscribers[kind.index()].len())
    }

    /// Number of events still awaiting acknowledgement.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if no event is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total number of events ever sent.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Drop for EventBroker {
    fn drop(&mut self) {
        let released = self.events.drain().len();
        if released > 0 {
            debug!(released, "event broker released unacknowledged events");
        }
    }
}
