use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;

/// A type-level boolean.
///
/// Used to compute whether an environment contains a scoped capability.
pub trait Flag {
    /// Logical disjunction with another flag.
    type Or<B: Flag>: Flag;
}

/// The flag that is set.
pub enum Yes {}

/// The flag that is not set.
pub enum No {}

impl Flag for Yes {
    type Or<B: Flag> = Yes;
}

impl Flag for No {
    type Or<B: Flag> = B;
}

/// A single service that an effect can require from its environment.
///
/// Implement this through `#[derive(Capability)]`, which also makes the type
/// usable as an [`Environment`] on its own.
pub trait Capability: Clone + Send + Sync + 'static {
    /// Whether the capability requires deterministic release at the end of a
    /// caller-defined scope.
    type Scoped: Flag;
}

/// Everything an effect needs to run.
///
/// Implemented for `()`, for single capabilities and for tuples of up to
/// eight capabilities.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Whether any part of the environment is scoped.
    type Scoped: Flag;
}

impl Environment for () {
    type Scoped = No;
}

macro_rules! tuple_environment {
    ($head:ident $(, $tail:ident)*) => {
        impl<$head: Capability, $($tail: Capability),*> Environment for ($head, $($tail,)*) {
            type Scoped = <<$head as Capability>::Scoped as Flag>::Or<
                <($($tail,)*) as Environment>::Scoped,
            >;
        }
    };
}

tuple_environment! { A }
tuple_environment! { A, B }
tuple_environment! { A, B, C }
tuple_environment! { A, B, C, D }
tuple_environment! { A, B, C, D, E }
tuple_environment! { A, B, C, D, E, F }
tuple_environment! { A, B, C, D, E, F, G }
tuple_environment! { A, B, C, D, E, F, G, H }

/// An environment that does not contain any scoped capability.
///
/// Memoized results outlive the scope of the caller that produced them, so
/// only effects with an unscoped environment can be memoized.
///
/// ```compile_fail
/// use effect_memo::{wrap, Capability, Effect, MemoStore};
///
/// #[derive(Clone, Capability)]
/// #[capability(scoped = true)]
/// struct Connection;
///
/// #[derive(Clone, Capability)]
/// struct Clock;
///
/// let store = MemoStore::new();
/// let _ = wrap(&store, |id: u32| {
///     Effect::<u32, (), (Clock, Connection)>::succeed(id)
/// });
/// ```
#[diagnostic::on_unimplemented(
    message = "effects that require `{Self}` cannot be memoized because it contains a scoped capability",
    label = "requires a scoped capability",
    note = "resources acquired in a `Scope` would be released while the memoized result is still alive"
)]
pub trait Unscoped: Environment {}

impl<R> Unscoped for R where R: Environment<Scoped = No> {}

/// A scope in which resources are acquired and then released when it closes.
///
/// This is the scoped capability: effects that require it can never be
/// memoized.
#[derive(Clone, Default)]
pub struct Scope(Arc<Mutex<ScopeState>>);

/// The finalizers of a scope.
#[derive(Default)]
struct ScopeState {
    finalizers: Vec<Box<dyn FnOnce() + Send>>,
    closed: bool,
}

impl Scope {
    /// Create a new open scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a finalizer to run when the scope closes.
    ///
    /// When the scope is already closed, the finalizer runs immediately.
    pub fn add_finalizer(&self, finalizer: impl FnOnce() + Send + 'static) {
        let mut state = self.0.lock();
        if state.closed {
            drop(state);
            finalizer();
            return;
        }
        state.finalizers.push(Box::new(finalizer));
    }

    /// Close the scope, running all finalizers in reverse order of
    /// registration. Closing twice does nothing.
    pub fn close(&self) {
        let finalizers = {
            let mut state = self.0.lock();
            state.closed = true;
            std::mem::take(&mut state.finalizers)
        };

        for finalizer in finalizers.into_iter().rev() {
            finalizer();
        }
    }

    /// Whether the scope was closed.
    pub fn is_closed(&self) -> bool {
        self.0.lock().closed
    }
}

impl AsRef<Scope> for Scope {
    fn as_ref(&self) -> &Scope {
        self
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let state = self.0.lock();
        f.debug_struct("Scope")
            .field("finalizers", &state.finalizers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Capability for Scope {
    type Scoped = Yes;
}

impl Environment for Scope {
    type Scoped = Yes;
}
