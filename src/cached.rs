use std::any::type_name;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::effect::Effect;
use crate::env::Unscoped;
use crate::exit::{Cause, Defect, Exit, Outcome};
use crate::fiber::Fiber;
use crate::hash::{FuncId, Key};
use crate::store::{Lookup, MemoStore, Store};

/// Identifies memoized functions for introspection.
pub const TAG: &str = "effect-memo/Cached";

/// A memoization slot: the one shared execution for a key.
///
/// Pending until the execution settles, then it hands out the stored exit.
type Slot<A, E> = Shared<BoxFuture<'static, Exit<A, E>>>;

/// Memoize an effectful function.
///
/// Returns a function with the same signature that, per distinct argument
/// tuple, executes the underlying effect at most once within the store. The
/// first caller to reach a key provides the environment for that execution
/// and all callers observe the same success, typed failure or defect.
///
/// Nothing executes until an effect returned by [`Cached::call`] runs.
///
/// Functions without captured state (fn items and closures that capture
/// nothing) are identified by their type, so wrapping such a function twice
/// with the same store shares the slots. Any other function gets its own
/// slots per call to `wrap`, even when another function of the same type was
/// wrapped before. Clones of a [`Cached`] share its slots.
///
/// ```
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// use effect_memo::{wrap, Effect, MemoStore};
///
/// let store = MemoStore::new();
/// let user = wrap(&store, |id: u32| {
///     Effect::<String, (), ()>::succeed(format!("user:{id}"))
/// });
///
/// assert_eq!(user.call(42).run(()).await, Ok("user:42".to_string()));
/// assert_eq!(store.len(), 1);
/// # });
/// ```
///
/// Effects that require a [`Scope`](crate::Scope) can't be memoized, because
/// the memoized result would outlive the scope's resources:
///
/// ```compile_fail
/// use effect_memo::{wrap, Effect, MemoStore, Scope};
///
/// let store = MemoStore::new();
/// let _ = wrap(&store, |id: u32| Effect::<u32, (), Scope>::succeed(id));
/// ```
pub fn wrap<S, F, Args, A, E, R>(store: &S, func: F) -> Cached<F, S>
where
    S: Store,
    F: Fn(Args) -> Effect<A, E, R> + Send + Sync + 'static,
    Args: Hash + Send + 'static,
    A: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    R: Unscoped,
{
    Cached {
        func: Arc::new(func),
        id: FuncId::of::<F>(),
        store: store.clone(),
        enabled: true,
    }
}

/// A memoized effectful function, created by [`wrap`].
pub struct Cached<F, S = MemoStore> {
    /// The underlying function.
    func: Arc<F>,
    /// Distinguishes the slots of this function from those of others.
    id: FuncId,
    /// Where the slots live.
    store: S,
    /// Whether memoization is active.
    enabled: bool,
}

impl<F, S: Store> Cached<F, S> {
    /// Turn memoization on or off.
    ///
    /// A disabled function executes the underlying effect on every run and
    /// never touches the store.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The identifier shared by all memoized functions.
    pub fn tag(&self) -> &'static str {
        TAG
    }

    /// Call the function.
    ///
    /// The returned effect looks up the slot for `args` when it runs. On a
    /// miss, it starts the underlying effect with the environment it was run
    /// with. In any case, it then waits for the slot's shared execution and
    /// replays its outcome.
    ///
    /// # Panics
    /// Running the returned effect dies when the shared execution was
    /// interrupted or ended with a composite cause. Such executions are never
    /// turned into a replayable outcome. On a miss, the effect must run within
    /// a tokio runtime, since the execution is spawned as a [`Fiber`].
    pub fn call<Args, A, E, R>(&self, args: Args) -> Effect<A, E, R>
    where
        F: Fn(Args) -> Effect<A, E, R> + Send + Sync + 'static,
        Args: Hash + Send + 'static,
        A: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        R: Unscoped,
    {
        let func = self.func.clone();
        if !self.enabled {
            return Effect::from_exit(move |env| (*func)(args).run_exit(env));
        }

        let id = self.id;
        let store = self.store.clone();
        Effect::from_exit(move |env: R| async move {
            let key = Key::new(id, &args);
            let lookup = store.get_or_create(key, move || start(func, args, env));
            record(&lookup, key, type_name::<F>());
            replay(lookup.into_inner().await)
        })
    }
}

/// Create the one execution backing a slot.
///
/// The function is only called when the slot is first polled, which happens
/// after the store released the slot table. It may thus use the store itself.
fn start<F, Args, A, E, R>(func: Arc<F>, args: Args, env: R) -> Slot<A, E>
where
    F: Fn(Args) -> Effect<A, E, R> + Send + Sync + 'static,
    Args: Send + 'static,
    A: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    R: Unscoped,
{
    async move {
        // A panic while building the effect is a defect of the execution, so
        // it is memoized like any other.
        let effect = std::panic::catch_unwind(AssertUnwindSafe(|| (*func)(args)))
            .unwrap_or_else(|payload| {
                Effect::failure(Cause::Die(Defect::from_panic(payload)))
            });

        Fiber::fork(effect, env).join().await
    }
    .boxed()
    .shared()
}

/// Report whether a lookup reused a slot.
fn record<T>(lookup: &Lookup<T>, key: Key, func: &'static str) {
    if lookup.is_hit() {
        tracing::debug!(func, ?key, "reusing memoized execution");
    } else {
        tracing::debug!(func, ?key, "starting memoized execution");
    }

    #[cfg(feature = "testing")]
    crate::testing::register(lookup.is_hit());
}

/// Translate a settled execution back into the effect system.
fn replay<A, E>(exit: Exit<A, E>) -> Exit<A, E> {
    match Outcome::classify(exit) {
        Ok(outcome) => outcome.into_exit(),
        Err(unsupported) => {
            tracing::error!(%unsupported, "memoized execution cannot be replayed");
            std::panic::panic_any(unsupported)
        }
    }
}

impl<F, S: Clone> Clone for Cached<F, S> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            id: self.id,
            store: self.store.clone(),
            enabled: self.enabled,
        }
    }
}

impl<F, S: Debug> Debug for Cached<F, S> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Cached")
            .field("func", &type_name::<F>())
            .field("id", &self.id)
            .field("store", &self.store)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::exit::Unsupported;

    #[test]
    fn test_replay_keeps_defect_identity() {
        let defect = Defect::new("fatal");
        let exit = replay::<u8, u8>(Exit::Failure(Cause::Die(defect.clone())));
        match exit {
            Exit::Failure(Cause::Die(replayed)) => assert!(replayed.ptr_eq(&defect)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_replay_rejects_interrupt() {
        let payload = std::panic::catch_unwind(|| {
            replay::<u8, u8>(Exit::Failure(Cause::Interrupt));
        })
        .unwrap_err();
        assert_eq!(payload.downcast_ref::<Unsupported>(), Some(&Unsupported::Interrupted));
    }

    #[tokio::test]
    async fn test_disabled_runs_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let store = MemoStore::new();
        let cached = wrap(&store, move |x: u8| {
            counter.fetch_add(1, Ordering::SeqCst);
            Effect::<u8, (), ()>::succeed(x)
        })
        .enabled(false);

        assert_eq!(cached.call(1).run(()).await, Ok(1));
        assert_eq!(cached.call(1).run(()).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
        assert_eq!(cached.tag(), TAG);
    }

    #[tokio::test]
    async fn test_panicking_constructor_is_memoized_as_defect() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cached = wrap(&MemoStore::new(), move |_: ()| -> Effect<u8, (), ()> {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("no effect for you")
        });

        for _ in 0..2 {
            match cached.call(()).run_exit(()).await {
                Exit::Failure(Cause::Die(defect)) => {
                    assert_eq!(defect.message(), "no effect for you")
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_function_may_use_its_store() {
        let store = MemoStore::new();
        let inner = store.clone();
        let cached = wrap(&store, move |x: u8| {
            Effect::<usize, (), ()>::succeed(inner.len() + usize::from(x))
        });

        assert_eq!(cached.call(1).run(()).await, Ok(2));
        assert_eq!(cached.call(1).run(()).await, Ok(2));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_identity() {
        let store = MemoStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cached = wrap(&store, move |x: u8| {
            counter.fetch_add(1, Ordering::SeqCst);
            Effect::<u8, (), ()>::succeed(x)
        });
        let clone = cached.clone();

        assert_eq!(cached.call(3).run(()).await, Ok(3));
        assert_eq!(clone.call(3).run(()).await, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
    }
}
