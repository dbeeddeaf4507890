// Lifecycle hooks fired by the execution context

use crate::{Error, ExecutionContext};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Named points in a request's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// The context exists; nothing has been parsed yet.
    ContextCreated,
    /// The request was parsed.
    RequestReceived,
    /// A route matched and path parameters are set.
    EndpointDetermined,
    /// The endpoint produced a response.
    ResponseCreated,
    /// The context reached `Finished` or `Error`. Failures here are logged
    /// and never change the outcome.
    ContextFinished,
}

impl HookEvent {
    /// Events in firing order.
    pub const ALL: [HookEvent; 5] = [
        HookEvent::ContextCreated,
        HookEvent::RequestReceived,
        HookEvent::EndpointDetermined,
        HookEvent::ResponseCreated,
        HookEvent::ContextFinished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::ContextCreated => "context_created",
            HookEvent::RequestReceived => "request_received",
            HookEvent::EndpointDetermined => "endpoint_determined",
            HookEvent::ResponseCreated => "response_created",
            HookEvent::ContextFinished => "context_finished",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A callback run at a lifecycle point. Returning an error ends the request
/// in the `Error` state.
pub trait Hook: Send + Sync {
    fn call(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), Error>;
}

impl<F> Hook for F
where
    F: Fn(&mut ExecutionContext<'_>) -> Result<(), Error> + Send + Sync,
{
    fn call(&self, ctx: &mut ExecutionContext<'_>) -> Result<(), Error> {
        self(ctx)
    }
}

/// Hooks per event, kept in registration order.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: HashMap<HookEvent, Vec<Arc<dyn Hook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event: HookEvent, hook: impl Hook + 'static) {
        self.hooks.entry(event).or_default().push(Arc::new(hook));
    }

    /// Run every hook for `event` in order, stopping at the first failure.
    pub fn fire(&self, event: HookEvent, ctx: &mut ExecutionContext<'_>) -> Result<(), Error> {
        let Some(hooks) = self.hooks.get(&event) else {
            return Ok(());
        };
        tracing::trace!(event = event.as_str(), hooks = hooks.len(), "Firing hooks");
        for hook in hooks {
            hook.call(ctx)?;
        }
        Ok(())
    }

    /// Number of hooks registered for `event`.
    pub fn count(&self, event: HookEvent) -> usize {
        self.hooks.get(&event).map_or(0, Vec::len)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for event in HookEvent::ALL {
            map.entry(&event.as_str(), &self.count(event));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let names: Vec<_> = HookEvent::ALL.iter().map(HookEvent::as_str).collect();
        assert_eq!(
            names,
            vec![
                "context_created",
                "request_received",
                "endpoint_determined",
                "response_created",
                "context_finished"
            ]
        );
    }

    fn noop(_: &mut ExecutionContext<'_>) -> Result<(), Error> {
        Ok(())
    }

    #[test]
    fn test_register_counts() {
        let mut registry = HookRegistry::new();
        registry.register(HookEvent::RequestReceived, noop);
        registry.register(HookEvent::RequestReceived, noop);
        assert_eq!(registry.count(HookEvent::RequestReceived), 2);
        assert_eq!(registry.count(HookEvent::ResponseCreated), 0);
    }
}
