//! Typed storage for extensions and per-request scratch data.
//!
//! [`Extensions`] is a map keyed by `TypeId`, holding at most one value per
//! type. It backs two things:
//!
//! - the storage each installed [`Extension`] receives, shared by every
//!   request and therefore wrapped in a `parking_lot::RwLock`
//!   ([`ExtensionStorage`]);
//! - `ExecutionContext::data`, owned by a single request, so no lock.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Protected(HashSet<String>);
//!
//! impl Extension for Auth {
//!     fn install(&self, app: &mut App, storage: ExtensionStorage) -> Result<(), Error> {
//!         storage.write().insert(Protected(HashSet::new()));
//!         app.hook(HookEvent::EndpointDetermined, move |ctx| {
//!             let guard = storage.read();
//!             // ...
//!             Ok(())
//!         });
//!         Ok(())
//!     }
//! }
//! ```

use crate::{App, Error};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-keyed value map.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// Storage handed to an installed extension, shared across requests.
pub type ExtensionStorage = Arc<RwLock<Extensions>>;

/// A pluggable component that installs hooks and keeps its own state.
pub trait Extension: Send + Sync + 'static {
    /// Name the extension's storage is registered under.
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }

    /// Register hooks on `app` and initialize `storage`.
    fn install(&self, app: &mut App, storage: ExtensionStorage) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Counter(u32);

    #[test]
    fn test_insert_and_get() {
        let mut ext = Extensions::new();
        assert!(ext.insert(Counter(1)).is_none());
        assert_eq!(ext.insert(Counter(2)), Some(Counter(1)));
        assert_eq!(ext.get::<Counter>(), Some(&Counter(2)));
        assert!(ext.get::<String>().is_none());
        assert_eq!(ext.len(), 1);
    }

    #[test]
    fn test_get_mut_and_remove() {
        let mut ext = Extensions::new();
        ext.insert(Counter(0));
        if let Some(counter) = ext.get_mut::<Counter>() {
            counter.0 += 5;
        }
        assert_eq!(ext.remove::<Counter>(), Some(Counter(5)));
        assert!(!ext.contains::<Counter>());
    }

    #[test]
    fn test_shared_storage() {
        let storage: ExtensionStorage = Arc::new(RwLock::new(Extensions::new()));
        let writer = storage.clone();
        writer.write().insert(Counter(9));
        assert_eq!(storage.read().get::<Counter>(), Some(&Counter(9)));
    }
}
