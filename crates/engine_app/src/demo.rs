//! Health/damage demo.
//!
//! A hazard hits one live player per sweep, the health system applies the
//! damage and removes dead players, and the watchdog stops the run once every
//! player is gone. Systems talk to each other only through events.

use std::time::Duration;

use anyhow::Result;
use engine_ecs::{Component, Entity, EntityType, Event, Kind, ListenerId, TypeRegistry, World};
use engine_system::{PriorityScheduler, System, SystemContext};
use tracing::{debug, info, warn};

use crate::config::DemoConfig;

/// A player entity.
#[derive(Debug)]
pub struct Player {
    /// Display name.
    pub name: String,
}

impl EntityType for Player {}

/// Remaining hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Component for Health {}

/// Damage dealt to one entity.
#[derive(Debug)]
pub struct Damage {
    pub amount: i32,
    pub target: Entity,
}

impl Event for Damage {
    fn target(&self) -> Option<Entity> {
        Some(self.target)
    }
}

/// An entity ran out of health and was destroyed.
#[derive(Debug)]
pub struct Died {
    pub entity: Entity,
}

impl Event for Died {
    fn target(&self) -> Option<Entity> {
        Some(self.entity)
    }
}

/// Hits one live player per sweep, cycling through them in slot order.
#[derive(Debug)]
pub struct HazardSystem {
    damage: i32,
    interval: Duration,
    hits: u64,
}

impl HazardSystem {
    /// Hits dealt so far.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }
}

impl System for HazardSystem {
    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Option<Duration> {
        let live = ctx.world.entities.len();
        if live == 0 {
            return None;
        }
        let pick = ((ctx.tick_id - 1) % live as u64) as usize;
        let target = ctx.world.entities.iter().nth(pick)?;
        match ctx.world.send(Damage {
            amount: self.damage,
            target,
        }) {
            Ok(id) => {
                self.hits += 1;
                debug!(%id, %target, amount = self.damage, "hazard hit");
            }
            Err(err) => warn!(%err, "hazard could not send damage"),
        }
        Some(self.interval)
    }

    fn priority(&self) -> i32 {
        10
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn name(&self) -> &'static str {
        "hazard"
    }
}

/// Applies [`Damage`] and destroys players whose health reaches zero.
#[derive(Debug)]
pub struct HealthSystem {
    listener: ListenerId,
}

impl HealthSystem {
    fn apply(world: &mut World, amount: i32, target: Entity) -> Result<()> {
        let dead = match world.component_mut::<Health>(target) {
            Some(health) => {
                health.current -= amount;
                debug!(entity = %target, current = health.current, max = health.max, "damage applied");
                health.current <= 0
            }
            // Already destroyed earlier in this sweep.
            None => false,
        };
        if !dead {
            return Ok(());
        }
        let name = world
            .entities
            .get::<Player>(target)
            .map(|player| player.name.clone())
            .unwrap_or_default();
        if world.despawn(target) {
            info!(entity = %target, name = %name, "player died");
            world.send(Died { entity: target })?;
        }
        Ok(())
    }
}

impl System for HealthSystem {
    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Option<Duration> {
        let world = &mut *ctx.world;
        while let Some(id) = world.events.next_event(self.listener) {
            let hit = world
                .events
                .get::<Damage>(id)
                .map(|hit| (hit.amount, hit.target));
            if let Err(err) = world.events.acknowledge(id, self.listener) {
                warn!(%err, "health system could not acknowledge event");
            }
            let Some((amount, target)) = hit else {
                continue;
            };
            if let Err(err) = Self::apply(world, amount, target) {
                warn!(%err, %target, "failed to apply damage");
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "health"
    }
}

/// Counts deaths and stops the run when no players remain.
#[derive(Debug)]
pub struct WatchdogSystem {
    listener: ListenerId,
    deaths: u32,
}

impl WatchdogSystem {
    /// Deaths observed so far.
    #[must_use]
    pub fn deaths(&self) -> u32 {
        self.deaths
    }
}

impl System for WatchdogSystem {
    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Option<Duration> {
        let events = &mut ctx.world.events;
        while let Some(id) = events.next_event(self.listener) {
            if events.is::<Died>(id) {
                self.deaths += 1;
            }
            if let Err(err) = events.acknowledge(id, self.listener) {
                warn!(%err, "watchdog could not acknowledge event");
            }
        }
        if ctx.world.entities.is_empty() && !ctx.stop_requested() {
            info!(tick_id = ctx.tick_id, deaths = self.deaths, "no players left");
            ctx.request_stop();
        }
        None
    }

    fn priority(&self) -> i32 {
        -10
    }

    fn name(&self) -> &'static str {
        "watchdog"
    }
}

/// Register every demo type, populate the world, and register the systems.
///
/// # Errors
///
/// Fails on registry or scheduler misconfiguration.
pub fn build(config: &DemoConfig) -> Result<(World, PriorityScheduler)> {
    let mut registry = TypeRegistry::new();
    registry.register::<Player>(Kind::Entity)?;
    registry.register::<Health>(Kind::Component)?;
    registry.register::<Damage>(Kind::Event)?;
    registry.register::<Died>(Kind::Event)?;
    registry.register::<HazardSystem>(Kind::System)?;
    registry.register::<HealthSystem>(Kind::System)?;
    registry.register::<WatchdogSystem>(Kind::System)?;
    let mut world = World::new(registry)?;

    for n in 0..config.players {
        let player = world.spawn(Player {
            name: format!("player-{n}"),
        })?;
        world.add_component(
            player,
            Health {
                current: config.starting_health,
                max: config.starting_health,
            },
        )?;
    }

    let health_listener = world.events.create_listener();
    world.events.subscribe::<Damage>(health_listener)?;
    let watchdog_listener = world.events.create_listener();
    world.events.subscribe::<Died>(watchdog_listener)?;

    let mut scheduler = PriorityScheduler::new();
    scheduler.finalize(world.registry())?;
    scheduler.register(HazardSystem {
        damage: config.damage_per_hit,
        interval: Duration::from_millis(config.hazard_interval_ms),
        hits: 0,
    })?;
    scheduler.register(HealthSystem {
        listener: health_listener,
    })?;
    scheduler.register(WatchdogSystem {
        listener: watchdog_listener,
        deaths: 0,
    })?;

    info!(
        players = config.players,
        order = ?scheduler.order(),
        "demo ready"
    );
    Ok((world, scheduler))
}

#[cfg(test)]
mod tests {
    use engine_system::Wake;

    use super::*;

    fn config(players: u32, starting_health: i32, damage_per_hit: i32) -> DemoConfig {
        DemoConfig {
            players,
            starting_health,
            damage_per_hit,
            hazard_interval_ms: 5,
        }
    }

    #[test]
    fn test_build_populates_world() {
        let (world, scheduler) = build(&config(3, 10, 1)).unwrap();
        assert_eq!(world.entities.len(), 3);
        assert_eq!(world.components.len(), 3);
        assert_eq!(scheduler.order(), vec!["hazard", "health", "watchdog"]);
        let first = world.entities.iter().next().unwrap();
        assert_eq!(world.entities.get::<Player>(first).unwrap().name, "player-0");
    }

    #[test]
    fn test_hit_is_applied_in_same_sweep() {
        let (mut world, mut scheduler) = build(&config(2, 10, 4)).unwrap();
        let first = world.entities.iter().next().unwrap();

        let wake = scheduler.update(&mut world);
        assert_eq!(wake, Wake::After(Duration::from_millis(5)));
        assert_eq!(
            world.component::<Health>(first),
            Some(&Health { current: 6, max: 10 })
        );
        assert!(world.events.is_empty());
    }

    #[test]
    fn test_players_die_and_watchdog_stops() {
        let (mut world, mut scheduler) = build(&config(2, 10, 5)).unwrap();

        let mut wakes = Vec::new();
        for _ in 0..4 {
            wakes.push(scheduler.update(&mut world));
        }

        assert_eq!(wakes.last(), Some(&Wake::Terminate));
        assert!(wakes[..3].iter().all(|wake| !wake.is_terminate()));
        assert!(world.entities.is_empty());
        assert!(world.components.is_empty());
        assert!(world.events.is_empty());
        assert_eq!(scheduler.get::<WatchdogSystem>().unwrap().deaths(), 2);
        assert_eq!(scheduler.get::<HazardSystem>().unwrap().hits(), 4);
    }

    #[test]
    fn test_no_players_stops_on_first_sweep() {
        let (mut world, mut scheduler) = build(&config(0, 10, 5)).unwrap();
        assert_eq!(scheduler.update(&mut world), Wake::Terminate);
        assert_eq!(scheduler.get::<HazardSystem>().unwrap().hits(), 0);
    }
}
