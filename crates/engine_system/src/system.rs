//! The [`System`] trait.

use std::any::Any;
use std::time::Duration;

use crate::context::SystemContext;

/// Upcast helpers so the scheduler can hand back concrete system types.
/// Implemented for every `'static` type.
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Borrow as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Convert a boxed value into `Box<dyn Any>`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A per-tick unit of behaviour. At most one instance per concrete type is
/// registered with a scheduler at a time.
///
/// Every registered system runs exactly once per sweep, whatever its
/// [`System::interval`]; the interval only shapes the pacing hint the sweep
/// returns to the driver.
pub trait System: AsAny {
    /// Do one tick of work.
    ///
    /// Returns how long the system would like to wait before its next turn,
    /// or `None` for no preference.
    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Option<Duration>;

    /// Priority used at registration. Higher runs earlier.
    fn priority(&self) -> i32 {
        0
    }

    /// Declared minimum update interval. Hints shorter than this are raised
    /// to it.
    fn interval(&self) -> Duration {
        Duration::ZERO
    }

    /// Name used in logs and [`crate::PriorityScheduler::order`].
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn System {
    /// Downcast to the concrete system type.
    #[must_use]
    pub fn downcast_ref<S: System>(&self) -> Option<&S> {
        self.as_any().downcast_ref::<S>()
    }

    /// Mutable variant of `downcast_ref`.
    #[must_use]
    pub fn downcast_mut<S: System>(&mut self) -> Option<&mut S> {
        self.as_any_mut().downcast_mut::<S>()
    }
}
