//! Store-layer error types.

use crate::entity::Entity;
use crate::registry::Kind;

/// Errors raised by the type registry and the entity/component stores.
///
/// Missing objects are not errors: lookups return `None` and removals report
/// failure through their return value. The variants here cover handles to
/// dead entities and startup misconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// A type was used by a store without being registered before finalize.
    #[error("{kind} type `{name}` was not registered before the store was finalized")]
    UnregisteredKind {
        /// Tag space the type was looked up in.
        kind: Kind,
        /// Rust type name.
        name: &'static str,
    },

    /// A new type was registered after the registry was sealed.
    #[error("cannot register {kind} type `{name}`: type registry is sealed")]
    RegistrySealed {
        /// Tag space the registration targeted.
        kind: Kind,
        /// Rust type name.
        name: &'static str,
    },

    /// A store was finalized from a registry that is still open.
    #[error("{0} finalized from an unsealed type registry")]
    RegistryNotSealed(&'static str),

    /// A store was finalized twice.
    #[error("{0} is already finalized")]
    AlreadyFinalized(&'static str),

    /// A store was used before its finalize step.
    #[error("{0} used before finalize")]
    NotFinalized(&'static str),

    /// The entity handle is out of range, freed, or from an older generation.
    #[error("invalid entity {0}")]
    InvalidEntity(Entity),
}
