//! The event core: shared watch caches fanning out to prioritized handlers,
//! with optional per-object serialization through a queue map.
//!
//! A [`WatchFactory`] owns one informer per resource kind. Controllers
//! register [`EventHandler`]s at a priority and look objects up through the
//! factory's cached lookup surface; they never touch the watch stream
//! directly.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod metrics;

mod factory;
mod handler;
mod informer;
mod object;
mod pump;
mod queue;

#[cfg(test)]
mod tests;

pub use self::factory::WatchFactory;
pub use self::handler::{EventHandler, FilterFn, HandlerId};
pub use self::object::{KubeObject, ResourceKind, WatchedResource};

use fabric_controller_core::ObjectKey;

/// Handlers registered without an explicit priority run first.
pub const DEFAULT_HANDLER_PRIORITY: usize = 0;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} {key} not found")]
    NotFound { kind: ResourceKind, key: ObjectKey },

    #[error("no informer registered for {0}")]
    UnknownKind(ResourceKind),

    #[error("expected an object of type {expected} but got {actual}")]
    TypeMismatch {
        expected: ResourceKind,
        actual: ResourceKind,
    },

    #[error("watch factory shut down")]
    ShutDown,
}
