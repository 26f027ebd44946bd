//! Priority scheduler: owns the registered systems and sweeps them in order.
//!
//! One instance per system kind may be registered at a time. A sweep
//! ([`PriorityScheduler::update`]) calls every registered system exactly once,
//! highest priority first, and folds the systems' pacing hints into a single
//! [`Wake`] value for the driver. Stopping is cooperative: a stop requested
//! mid-sweep lets the sweep finish and is reported afterwards.

use std::time::Duration;

use engine_component::{EcsError, Kind, KindIndex, TypeRegistry, TypeTag};
use engine_ecs::World;
use tracing::{debug, info, trace, warn};

use crate::context::SystemContext;
use crate::error::SchedulerError;
use crate::order::{OrderKey, SystemOrder};
use crate::system::System;

/// What the driver should do after a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Sweep again after this long. Advisory only.
    After(Duration),
    /// No system expressed a preference.
    Idle,
    /// A stop was requested; the driver should exit its loop.
    Terminate,
}

impl Wake {
    /// Returns `true` for [`Wake::Terminate`].
    #[must_use]
    pub fn is_terminate(self) -> bool {
        matches!(self, Wake::Terminate)
    }
}

struct SystemEntry {
    system: Box<dyn System>,
    key: OrderKey,
    name: &'static str,
}

/// Owns one instance per registered system kind and the order they run in.
pub struct PriorityScheduler {
    index: Option<KindIndex>,
    /// `slots[system tag]`.
    slots: Vec<Option<SystemEntry>>,
    order: SystemOrder,
    next_seq: u64,
    stop_requested: bool,
    tick_id: u64,
}

impl std::fmt::Debug for PriorityScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityScheduler")
            .field("order", &self.order())
            .field("stop_requested", &self.stop_requested)
            .field("tick_id", &self.tick_id)
            .finish()
    }
}

impl PriorityScheduler {
    /// Create an empty scheduler. It must be finalized before systems can be
    /// registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: None,
            slots: Vec::new(),
            order: SystemOrder::new(),
            next_seq: 0,
            stop_requested: false,
            tick_id: 0,
        }
    }

    /// Size one slot per registered system kind.
    ///
    /// # Errors
    ///
    /// Fails if the registry is not sealed or the scheduler was finalized
    /// before.
    pub fn finalize(&mut self, registry: &TypeRegistry) -> Result<(), SchedulerError> {
        if !registry.is_sealed() {
            return Err(EcsError::RegistryNotSealed("scheduler").into());
        }
        if self.index.is_some() {
            return Err(EcsError::AlreadyFinalized("scheduler").into());
        }
        let index = registry.index(Kind::System);
        self.slots = (0..index.len()).map(|_| None).collect();
        debug!(kinds = index.len(), "scheduler finalized");
        self.index = Some(index);
        Ok(())
    }

    fn tag_of<S: System>(&self) -> Result<TypeTag, SchedulerError> {
        let index = self
            .index
            .as_ref()
            .ok_or(EcsError::NotFinalized("scheduler"))?;
        Ok(index.tag_of::<S>()?)
    }

    fn entry<S: System>(&self) -> Option<&SystemEntry> {
        let tag = self.tag_of::<S>().ok()?;
        self.slots[tag.index()].as_ref()
    }

    fn entry_mut<S: System>(&mut self) -> Option<&mut SystemEntry> {
        let tag = self.tag_of::<S>().ok()?;
        self.slots[tag.index()].as_mut()
    }

    /// Register `system` at the priority it declares.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRegistered`] if an instance of `S` is
    /// already registered (the existing instance is untouched), or a store
    /// error if `S` was never registered as a system kind.
    pub fn register<S: System>(&mut self, system: S) -> Result<&mut S, SchedulerError> {
        let tag = self.tag_of::<S>()?;
        let name = system.name();
        if self.slots[tag.index()].is_some() {
            warn!(system = name, "system already registered");
            return Err(SchedulerError::AlreadyRegistered(name));
        }

        let key = OrderKey {
            priority: system.priority(),
            seq: self.next_seq,
            tag,
        };
        self.next_seq += 1;
        self.order.insert(key);
        info!(
            system = name,
            priority = key.priority,
            interval_ms = system.interval().as_millis() as u64,
            "system registered"
        );

        let entry = self.slots[tag.index()].insert(SystemEntry {
            system: Box::new(system),
            key,
            name,
        });
        match entry.system.downcast_mut::<S>() {
            Some(system) => Ok(system),
            None => unreachable!("system slot holds the value just registered"),
        }
    }

    /// Remove the `S` instance and hand it back.
    pub fn unregister<S: System>(&mut self) -> Option<S> {
        let tag = self.tag_of::<S>().ok()?;
        let entry = self.slots[tag.index()].take()?;
        self.order.remove(entry.key);
        info!(system = entry.name, "system unregistered");
        entry.system.into_any().downcast::<S>().ok().map(|boxed| *boxed)
    }

    /// Change the priority of the `S` instance and move it to its new place
    /// in the sweep order.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRegistered`] if no `S` is registered.
    pub fn set_priority<S: System>(&mut self, priority: i32) -> Result<(), SchedulerError> {
        let Some(tag) = self.tag_of::<S>().ok() else {
            return Err(SchedulerError::NotRegistered(std::any::type_name::<S>()));
        };
        let Some(entry) = self.slots[tag.index()].as_mut() else {
            return Err(SchedulerError::NotRegistered(std::any::type_name::<S>()));
        };
        let old = entry.key.priority;
        entry.key = self.order.reposition(entry.key, priority);
        debug!(system = entry.name, old, new = priority, "system priority changed");
        Ok(())
    }

    /// Current priority of the `S` instance.
    #[must_use]
    pub fn priority_of<S: System>(&self) -> Option<i32> {
        self.entry::<S>().map(|entry| entry.key.priority)
    }

    /// Returns `true` if an `S` instance is registered.
    #[must_use]
    pub fn is_registered<S: System>(&self) -> bool {
        self.entry::<S>().is_some()
    }

    /// The registered `S` instance.
    #[must_use]
    pub fn get<S: System>(&self) -> Option<&S> {
        self.entry::<S>()?.system.downcast_ref::<S>()
    }

    /// Mutable variant of [`PriorityScheduler::get`].
    #[must_use]
    pub fn get_mut<S: System>(&mut self) -> Option<&mut S> {
        self.entry_mut::<S>()?.system.downcast_mut::<S>()
    }

    /// System names in sweep order.
    #[must_use]
    pub fn order(&self) -> Vec<&'static str> {
        self.order
            .iter()
            .filter_map(|key| self.slots.get(key.tag.index())?.as_ref())
            .map(|entry| entry.name)
            .collect()
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of sweeps run so far.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Ask the scheduler to stop. Takes effect after the current sweep.
    pub fn request_stop(&mut self) {
        if !self.stop_requested {
            info!(tick_id = self.tick_id, "stop requested");
        }
        self.stop_requested = true;
    }

    /// Returns `false` once a stop has been requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.stop_requested
    }

    /// Run every registered system once, in priority order.
    ///
    /// Each system's hint is raised to its current declared interval and the
    /// minimum across systems is returned. A system returning `None` does not
    /// contribute, whatever its interval. If a stop was requested before or during the
    /// sweep, the sweep still completes and [`Wake::Terminate`] is returned.
    pub fn update(&mut self, world: &mut World) -> Wake {
        self.tick_id += 1;
        let tick_id = self.tick_id;
        trace!(tick_id, systems = self.order.len(), "sweep start");

        let Self {
            slots,
            order,
            stop_requested,
            ..
        } = self;

        let mut next: Option<Duration> = None;
        for key in order.iter() {
            let Some(entry) = slots[key.tag.index()].as_mut() else {
                panic!("system order lists {:?} but its slot is empty", key.tag);
            };
            let mut ctx = SystemContext::new(tick_id, world, stop_requested);
            let hint = entry
                .system
                .update(&mut ctx)
                .map(|wanted| wanted.max(entry.system.interval()));
            trace!(tick_id, system = entry.name, ?hint, "system updated");
            if let Some(hint) = hint {
                next = Some(next.map_or(hint, |current| current.min(hint)));
            }
        }

        if self.stop_requested {
            debug!(tick_id, "sweep finished after stop request");
            return Wake::Terminate;
        }
        next.map_or(Wake::Idle, Wake::After)
    }
}

impl Default for PriorityScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PriorityScheduler {
    fn drop(&mut self) {
        if !self.order.is_empty() {
            debug!(released = self.order.len(), "scheduler released registered systems");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use engine_ecs::{Component, Entity, EntityType, Event, ListenerId};

    use super::*;

    type CallLog = Rc<RefCell<Vec<usize>>>;

    /// Records its id into a shared log each sweep.
    #[derive(Debug)]
    struct Tracer<const ID: usize> {
        log: CallLog,
        priority: i32,
        hint: Option<Duration>,
        interval: Duration,
        stop: bool,
    }

    impl<const ID: usize> Tracer<ID> {
        fn new(log: &CallLog, priority: i32) -> Self {
            Self {
                log: Rc::clone(log),
                priority,
                hint: None,
                interval: Duration::ZERO,
                stop: false,
            }
        }
    }

    impl<const ID: usize> System for Tracer<ID> {
        fn update(&mut self, ctx: &mut SystemContext<'_>) -> Option<Duration> {
            self.log.borrow_mut().push(ID);
            if self.stop {
                ctx.request_stop();
            }
            self.hint
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn interval(&self) -> Duration {
            self.interval
        }
    }

    type A = Tracer<0>;
    type B = Tracer<1>;
    type C = Tracer<2>;

    struct Player;
    impl EntityType for Player {}

    #[derive(Debug)]
    struct Health {
        hp: i32,
    }
    impl Component for Health {}

    struct Damage {
        amount: i32,
        target: Entity,
    }
    impl Event for Damage {
        fn target(&self) -> Option<Entity> {
            Some(self.target)
        }
    }

    /// Applies damage events; destroys entities whose health drops to zero.
    struct HealthSystem {
        listener: ListenerId,
    }

    impl System for HealthSystem {
        fn update(&mut self, ctx: &mut SystemContext<'_>) -> Option<Duration> {
            let world = &mut *ctx.world;
            while let Some(id) = world.events.next_event(self.listener) {
                let Some(hit) = world.events.get::<Damage>(id) else {
                    continue;
                };
                let (amount, target) = (hit.amount, hit.target);
                world.events.acknowledge(id, self.listener).unwrap();

                let dead = match world.components.get_mut::<Health>(target) {
                    Some(health) => {
                        health.hp -= amount;
                        health.hp <= 0
                    }
                    None => false,
                };
                if dead {
                    world.despawn(target);
                }
            }
            None
        }
    }

    struct Ping;
    impl Event for Ping {}

    /// Sends one `Ping` on its first turn.
    struct Pinger {
        sent: bool,
    }

    impl System for Pinger {
        fn update(&mut self, ctx: &mut SystemContext<'_>) -> Option<Duration> {
            if !self.sent {
                ctx.world.send(Ping).unwrap();
                self.sent = true;
            }
            None
        }

        fn priority(&self) -> i32 {
            -5
        }
    }

    /// Records the sweeps on which it received a `Ping`.
    struct Catcher {
        listener: ListenerId,
        turns: u32,
        received: Vec<u64>,
    }

    impl System for Catcher {
        fn update(&mut self, ctx: &mut SystemContext<'_>) -> Option<Duration> {
            self.turns += 1;
            let events = &mut ctx.world.events;
            while let Some(id) = events.next_event(self.listener) {
                assert!(events.is::<Ping>(id));
                events.acknowledge(id, self.listener).unwrap();
                self.received.push(ctx.tick_id);
            }
            None
        }

        fn priority(&self) -> i32 {
            5
        }
    }

    fn setup() -> (World, PriorityScheduler) {
        let mut registry = TypeRegistry::new();
        registry.register::<Player>(Kind::Entity).unwrap();
        registry.register::<Health>(Kind::Component).unwrap();
        registry.register::<Damage>(Kind::Event).unwrap();
        registry.register::<Ping>(Kind::Event).unwrap();
        registry.register::<A>(Kind::System).unwrap();
        registry.register::<B>(Kind::System).unwrap();
        registry.register::<C>(Kind::System).unwrap();
        registry.register::<HealthSystem>(Kind::System).unwrap();
        registry.register::<Pinger>(Kind::System).unwrap();
        registry.register::<Catcher>(Kind::System).unwrap();
        let world = World::new(registry).unwrap();
        let mut scheduler = PriorityScheduler::new();
        scheduler.finalize(world.registry()).unwrap();
        (world, scheduler)
    }

    fn log() -> CallLog {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_register_before_finalize_fails() {
        let mut scheduler = PriorityScheduler::new();
        let err = scheduler.register(A::new(&log(), 0)).unwrap_err();
        assert_eq!(err, SchedulerError::Store(EcsError::NotFinalized("scheduler")));
    }

    #[test]
    fn test_sweep_runs_in_descending_priority() {
        let (mut world, mut scheduler) = setup();
        let calls = log();
        scheduler.register(A::new(&calls, 1)).unwrap();
        scheduler.register(B::new(&calls, 5)).unwrap();
        scheduler.register(C::new(&calls, 3)).unwrap();

        scheduler.update(&mut world);
        assert_eq!(*calls.borrow(), vec![1, 2, 0]);

        calls.borrow_mut().clear();
        scheduler.set_priority::<A>(10).unwrap();
        assert_eq!(scheduler.priority_of::<A>(), Some(10));
        scheduler.update(&mut world);
        assert_eq!(*calls.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_equal_priorities_run_in_registration_order() {
        let (mut world, mut scheduler) = setup();
        let calls = log();
        scheduler.register(C::new(&calls, 0)).unwrap();
        scheduler.register(A::new(&calls, 0)).unwrap();
        scheduler.register(B::new(&calls, 0)).unwrap();
        scheduler.update(&mut world);
        assert_eq!(*calls.borrow(), vec![2, 0, 1]);
    }

    #[test]
    fn test_duplicate_registration_keeps_existing_instance() {
        let (_, mut scheduler) = setup();
        let calls = log();
        scheduler.register(A::new(&calls, 4)).unwrap();
        let err = scheduler.register(A::new(&calls, 9)).unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyRegistered(_)));
        assert_eq!(scheduler.priority_of::<A>(), Some(4));
        assert_eq!(scheduler.get::<A>().unwrap().priority, 4);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_unregister_removes_from_sweep() {
        let (mut world, mut scheduler) = setup();
        let calls = log();
        scheduler.register(A::new(&calls, 0)).unwrap();
        scheduler.register(B::new(&calls, 1)).unwrap();

        let removed = scheduler.unregister::<B>().unwrap();
        assert_eq!(removed.priority, 1);
        assert!(!scheduler.is_registered::<B>());
        assert!(scheduler.unregister::<B>().is_none());

        scheduler.update(&mut world);
        assert_eq!(*calls.borrow(), vec![0]);

        // The slot is free again.
        scheduler.register(B::new(&calls, 2)).unwrap();
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn test_set_priority_on_unregistered_fails() {
        let (_, mut scheduler) = setup();
        assert!(matches!(
            scheduler.set_priority::<C>(3),
            Err(SchedulerError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_order_lists_names() {
        let (_, mut scheduler) = setup();
        let calls = log();
        scheduler.register(A::new(&calls, 0)).unwrap();
        scheduler.register(B::new(&calls, 1)).unwrap();
        let order = scheduler.order();
        assert_eq!(order.len(), 2);
        assert!(order[0].contains("Tracer<1>"));
    }

    #[test]
    fn test_hint_is_minimum_of_clamped_system_hints() {
        let (mut world, mut scheduler) = setup();
        let calls = log();
        let a = scheduler.register(A::new(&calls, 0)).unwrap();
        a.hint = Some(Duration::from_millis(5));
        a.interval = Duration::from_millis(10);
        let b = scheduler.register(B::new(&calls, 0)).unwrap();
        b.hint = Some(Duration::from_millis(20));
        scheduler.register(C::new(&calls, 0)).unwrap();

        assert_eq!(
            scheduler.update(&mut world),
            Wake::After(Duration::from_millis(10))
        );
    }

    #[test]
    fn test_interval_does_not_skip_systems() {
        let (mut world, mut scheduler) = setup();
        let calls = log();
        let a = scheduler.register(A::new(&calls, 0)).unwrap();
        a.hint = Some(Duration::from_millis(1));
        a.interval = Duration::from_secs(60);
        for _ in 0..3 {
            assert_eq!(scheduler.update(&mut world), Wake::After(Duration::from_secs(60)));
        }
        assert_eq!(*calls.borrow(), vec![0, 0, 0]);
    }

    #[test]
    fn test_interval_change_applies_on_next_sweep() {
        let (mut world, mut scheduler) = setup();
        let calls = log();
        scheduler.register(A::new(&calls, 0)).unwrap().hint = Some(Duration::from_millis(1));
        assert_eq!(scheduler.update(&mut world), Wake::After(Duration::from_millis(1)));

        scheduler.get_mut::<A>().unwrap().interval = Duration::from_millis(40);
        assert_eq!(scheduler.update(&mut world), Wake::After(Duration::from_millis(40)));
    }

    #[test]
    fn test_no_hint_ignores_interval() {
        let (mut world, mut scheduler) = setup();
        let calls = log();
        scheduler.register(A::new(&calls, 0)).unwrap().interval = Duration::from_millis(50);
        assert_eq!(scheduler.update(&mut world), Wake::Idle);

        scheduler.register(B::new(&calls, 0)).unwrap().hint = Some(Duration::from_millis(3));
        assert_eq!(scheduler.update(&mut world), Wake::After(Duration::from_millis(3)));
    }

    #[test]
    fn test_no_hints_is_idle() {
        let (mut world, mut scheduler) = setup();
        assert_eq!(scheduler.update(&mut world), Wake::Idle);
        scheduler.register(A::new(&log(), 0)).unwrap();
        assert_eq!(scheduler.update(&mut world), Wake::Idle);
        assert_eq!(scheduler.tick_id(), 2);
    }

    #[test]
    fn test_stop_mid_sweep_completes_sweep() {
        let (mut world, mut scheduler) = setup();
        let calls = log();
        scheduler.register(A::new(&calls, 1)).unwrap();
        scheduler.register(B::new(&calls, 5)).unwrap().stop = true;
        scheduler.register(C::new(&calls, 3)).unwrap();

        assert_eq!(scheduler.update(&mut world), Wake::Terminate);
        assert_eq!(*calls.borrow(), vec![1, 2, 0]);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_request_stop_from_driver() {
        let (mut world, mut scheduler) = setup();
        let calls = log();
        scheduler.register(A::new(&calls, 0)).unwrap();
        scheduler.request_stop();
        assert!(scheduler.update(&mut world).is_terminate());
        assert_eq!(*calls.borrow(), vec![0]);
    }

    #[test]
    fn test_event_sent_mid_sweep_arrives_next_turn() {
        let (mut world, mut scheduler) = setup();
        let listener = world.events.create_listener();
        world.events.subscribe::<Ping>(listener).unwrap();
        scheduler
            .register(Catcher {
                listener,
                turns: 0,
                received: Vec::new(),
            })
            .unwrap();
        scheduler.register(Pinger { sent: false }).unwrap();

        scheduler.update(&mut world);
        let catcher = scheduler.get::<Catcher>().unwrap();
        assert_eq!(catcher.turns, 1);
        assert!(catcher.received.is_empty());
        assert_eq!(world.events.queue_len(listener), 1);
        assert_eq!(world.events.len(), 1);

        scheduler.update(&mut world);
        let catcher = scheduler.get::<Catcher>().unwrap();
        assert_eq!(catcher.turns, 2);
        assert_eq!(catcher.received, vec![2]);
        assert!(world.events.is_empty());
    }

    #[test]
    fn test_damage_event_destroys_entity() {
        let (mut world, mut scheduler) = setup();
        let listener = world.events.create_listener();
        world.events.subscribe::<Damage>(listener).unwrap();
        scheduler.register(HealthSystem { listener }).unwrap();
        assert_eq!(scheduler.priority_of::<HealthSystem>(), Some(0));

        let e = world.spawn(Player).unwrap();
        world.add_component(e, Health { hp: 10 }).unwrap();
        let id = world.send(Damage { amount: 10, target: e }).unwrap();

        scheduler.update(&mut world);

        assert!(world.component::<Health>(e).is_none());
        assert!(!world.is_alive(e));
        assert!(world.events.get::<Damage>(id).is_none());
        assert!(world.events.is_empty());
    }

    #[test]
    fn test_partial_damage_keeps_entity() {
        let (mut world, mut scheduler) = setup();
        let listener = world.events.create_listener();
        world.events.subscribe::<Damage>(listener).unwrap();
        scheduler.register(HealthSystem { listener }).unwrap();

        let e = world.spawn(Player).unwrap();
        world.add_component(e, Health { hp: 10 }).unwrap();
        world.send(Damage { amount: 3, target: e }).unwrap();
        world.send(Damage { amount: 3, target: e }).unwrap();
        scheduler.update(&mut world);

        assert_eq!(world.component::<Health>(e).unwrap().hp, 4);
        assert!(world.is_alive(e));
    }
}
