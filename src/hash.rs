use std::any::TypeId;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use siphasher::sip128::{Hasher128, SipHasher13};

/// The next identity handed out to a function with captured state.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// The identity of a memoized function.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FuncId {
    /// A function without state, identified by its type.
    Type(TypeId),
    /// A function with captured state, identified per wrapping.
    Instance(u64),
}

impl FuncId {
    /// Allocate the identity for a newly wrapped function of type `F`.
    ///
    /// Zero-sized functions (fn items and closures without captures) behave
    /// the same for every value of their type, so all of them share one
    /// identity. Everything else gets a fresh one.
    pub fn of<F: 'static>() -> Self {
        if size_of::<F>() == 0 {
            Self::Type(TypeId::of::<F>())
        } else {
            Self::Instance(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
        }
    }
}

/// Identifies a memoization slot.
///
/// Consists of the memoized function's identity and a 128-bit hash of the
/// argument tuple. Two argument tuples map to the same slot exactly when their
/// `Hash` implementations feed the same data into the hasher, so arguments
/// should hash structurally. Arguments that hash by address or that can
/// change behind a shared reference produce unstable keys.
///
/// The environment is never part of the key.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Key {
    /// The identity of the memoized function.
    func: FuncId,
    /// The hash of the arguments.
    args: u128,
}

impl Key {
    /// Derive the key for a call of the function with the given arguments.
    pub fn new<Args: Hash + ?Sized>(func: FuncId, args: &Args) -> Self {
        Self { func, args: hash(args) }
    }

    /// The hash of the arguments.
    pub fn args(&self) -> u128 {
        self.args
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Key({:?}, {:032x})", self.func, self.args)
    }
}

/// Produce a 128-bit hash of a value.
#[inline]
pub fn hash<T: Hash + ?Sized>(value: &T) -> u128 {
    let mut state = SipHasher13::new();
    value.hash(&mut state);
    state.finish128().as_u128()
}
