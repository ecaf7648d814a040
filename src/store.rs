use std::any::{Any, type_name};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::hash::Key;

/// A memoization scope that maps keys to shared slots.
///
/// The store decides how long slots live. Memoized functions never remove
/// anything from it.
pub trait Store: Clone + Send + Sync + 'static {
    /// Return the slot for the key, creating it with `create` if there is
    /// none yet.
    ///
    /// `create` must run at most once per key, also when multiple callers
    /// race for the same key.
    fn get_or_create<T, F>(&self, key: Key, create: F) -> Lookup<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T;
}

/// The result of a store lookup.
#[derive(Debug, Clone)]
pub enum Lookup<T> {
    /// The slot already existed.
    Hit(T),
    /// The slot was just created.
    Miss(T),
}

impl<T> Lookup<T> {
    /// Whether the slot already existed.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Extract the slot.
    pub fn into_inner(self) -> T {
        match self {
            Self::Hit(slot) | Self::Miss(slot) => slot,
        }
    }
}

/// An in-memory memoization scope.
///
/// Clones share the same slots. The slots are discarded together with the
/// last handle, so a store typically lives exactly as long as one logical
/// request.
#[derive(Clone, Default)]
pub struct MemoStore(Arc<Mutex<FxHashMap<Key, Box<dyn Any + Send + Sync>>>>);

impl MemoStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of slots.
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoStore {
    fn get_or_create<T, F>(&self, key: Key, create: F) -> Lookup<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        // Creation happens with the lock held, so that concurrent lookups
        // of the same key can't create two slots.
        let mut map = self.0.lock();
        if let Some(slot) = map.get(&key) {
            let Some(slot) = slot.downcast_ref::<T>() else {
                panic!(
                    "effect-memo: slot {key:?} does not hold a `{}`",
                    type_name::<T>()
                );
            };
            return Lookup::Hit(slot.clone());
        }

        let slot = create();
        map.insert(key, Box::new(slot.clone()));
        Lookup::Miss(slot)
    }
}

impl Debug for MemoStore {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("MemoStore").field("len", &self.len()).finish()
    }
}
