//! Per-tick execution context provided to systems.

use engine_ecs::World;

/// What a system sees during its turn in a sweep.
///
/// Systems run one at a time, so the context hands out the whole world
/// mutably. Handles are generation-checked: an entity destroyed earlier in
/// the same sweep simply stops resolving.
#[derive(Debug)]
pub struct SystemContext<'w> {
    /// The sweep counter, starting at 1 for the first sweep.
    pub tick_id: u64,
    /// The shared world.
    pub world: &'w mut World,
    stop_requested: &'w mut bool,
}

impl<'w> SystemContext<'w> {
    /// Create a context for one system turn.
    #[must_use]
    pub fn new(tick_id: u64, world: &'w mut World, stop_requested: &'w mut bool) -> Self {
        Self {
            tick_id,
            world,
            stop_requested,
        }
    }

    /// Ask the scheduler to stop. The current sweep still runs to the end.
    pub fn request_stop(&mut self) {
        *self.stop_requested = true;
    }

    /// Returns `true` if a stop has been requested.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        *self.stop_requested
    }
}
