//! Synchronous event bus for volume hooks.
//!
//! Events are identified by name and carry an ordered list of string
//! parameters. Handlers run in registration order on the emitting thread.

use std::collections::HashMap;
use std::fmt;

use strata_common::{StrataError, StrataResult};

use crate::filesystem::Provisioner;
use crate::storage::StorageBackend;
use crate::systemd::ServiceManager;
use crate::volume::{VolumeEvent, VolumeManager, VolumeOperation, VolumeRequest};

type Handler<'a, T> = Box<dyn FnMut(&[String]) -> StrataResult<T> + 'a>;

/// Named events mapped to their handlers.
pub struct HookBus<'a, T> {
    handlers: HashMap<String, Vec<Handler<'a, T>>>,
}

impl<'a, T> HookBus<'a, T> {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `event`.
    pub fn connect<F>(&mut self, event: impl Into<String>, handler: F)
    where
        F: FnMut(&[String]) -> StrataResult<T> + 'a,
    {
        self.handlers
            .entry(event.into())
            .or_default()
            .push(Box::new(handler));
    }

    /// Whether any handler listens for `event`.
    #[must_use]
    pub fn is_connected(&self, event: &str) -> bool {
        self.handlers.get(event).is_some_and(|h| !h.is_empty())
    }

    /// Names of all connected events, sorted.
    #[must_use]
    pub fn events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        events.sort_unstable();
        events
    }

    /// Run every handler for `event` and collect their results.
    ///
    /// Stops at the first failing handler.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownEvent`] if nothing listens for `event`.
    pub fn emit(&mut self, event: &str, params: &[String]) -> StrataResult<Vec<T>> {
        let handlers = self
            .handlers
            .get_mut(event)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| StrataError::UnknownEvent {
                event: event.to_string(),
            })?;

        tracing::debug!(event, ?params, handlers = handlers.len(), "Emitting hook");
        handlers.iter_mut().map(|handler| handler(params)).collect()
    }
}

impl<T> Default for HookBus<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HookBus<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBus")
            .field("events", &self.events())
            .finish()
    }
}

/// Connect the `volume-*` events to `manager`.
///
/// Each handler turns its parameters into a [`VolumeRequest`] and dispatches
/// it under the volume lock.
pub fn connect_volume_hooks<'a, B, S, P>(
    bus: &mut HookBus<'a, VolumeEvent>,
    manager: &'a VolumeManager<B, S, P>,
) where
    B: StorageBackend,
    S: ServiceManager,
    P: Provisioner,
{
    for operation in VolumeOperation::ALL {
        let event = operation.event_name();
        bus.connect(event, move |params: &[String]| {
            let request = VolumeRequest::from_event(event, params)?;
            manager.dispatch(&request)
        });
    }
}
